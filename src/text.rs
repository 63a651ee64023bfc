// 🔤 Text helpers shared by locator, extractors and resolver
// Japanese reports mix full-width (全角) and half-width (半角) glyphs freely.

/// Map full-width digits (０-９) to ASCII; everything else untouched
pub fn fold_fullwidth_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '０'..='９' => shift_fullwidth(c),
            _ => c,
        })
        .collect()
}

/// Map full-width Latin letters and digits to ASCII
pub fn fold_fullwidth_alnum(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '０'..='９' | 'Ａ'..='Ｚ' | 'ａ'..='ｚ' => shift_fullwidth(c),
            _ => c,
        })
        .collect()
}

/// Full-width digits plus the punctuation that appears around ratios
pub fn fold_numeric_glyphs(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '０'..='９' | '％' | '．' => shift_fullwidth(c),
            _ => c,
        })
        .collect()
}

// U+FF01..U+FF5E sit exactly 0xFEE0 above their ASCII counterparts
fn shift_fullwidth(c: char) -> char {
    char::from_u32(c as u32 - 0xFEE0).unwrap_or(c)
}

/// Bare integer rank ("1", "１", " 3 ") in 1..=10; anything else is None
pub fn parse_rank_number(cell: &str) -> Option<u8> {
    match fold_fullwidth_digits(cell).trim().parse::<u8>() {
        Ok(rank) if (1..=10).contains(&rank) => Some(rank),
        _ => None,
    }
}

/// Lenient rank label: also accepts a trailing 位 or '.' ("10位", "3.")
pub fn parse_rank(cell: &str) -> Option<u8> {
    let folded = fold_fullwidth_digits(cell);
    parse_rank_number(folded.trim().trim_end_matches('位').trim_end_matches('.'))
}

/// Keep ASCII digits only (after folding full-width digits)
pub fn digits_only(s: &str) -> String {
    fold_fullwidth_digits(s)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_digits() {
        assert_eq!(fold_fullwidth_digits("２０２４年１月"), "2024年1月");
        assert_eq!(fold_fullwidth_digits("ＡＢ１"), "ＡＢ1");
    }

    #[test]
    fn test_fold_alnum() {
        assert_eq!(fold_fullwidth_alnum("ＡＢＣ１２３ｘ"), "ABC123x");
        assert_eq!(fold_fullwidth_alnum("トヨタ"), "トヨタ");
    }

    #[test]
    fn test_fold_numeric_glyphs() {
        assert_eq!(fold_numeric_glyphs("４．２％"), "4.2%");
    }

    #[test]
    fn test_parse_rank() {
        assert_eq!(parse_rank("1"), Some(1));
        assert_eq!(parse_rank("１０"), Some(10));
        assert_eq!(parse_rank(" 3 "), Some(3));
        assert_eq!(parse_rank("2位"), Some(2));
        assert_eq!(parse_rank("0"), None);
        assert_eq!(parse_rank("11"), None);
        assert_eq!(parse_rank("銘柄"), None);
        assert_eq!(parse_rank(""), None);
    }

    #[test]
    fn test_parse_rank_number_is_strict() {
        assert_eq!(parse_rank_number("１"), Some(1));
        assert_eq!(parse_rank_number(" 10 "), Some(10));
        assert_eq!(parse_rank_number("3位"), None);
        assert_eq!(parse_rank_number("3."), None);
        assert_eq!(parse_rank_number("11"), None);
    }

    #[test]
    fn test_digits_only() {
        assert_eq!(digits_only("7203.T"), "7203");
        assert_eq!(digits_only("(６７５８)"), "6758");
    }
}
