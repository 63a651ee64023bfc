// 🏷️ Resolver - display name → canonical 4-character code
//
// Tiered policy, order is load-bearing:
//   1. exact normalized match          → EXACT
//   2. key of ≤ 2 chars                → TOO_SHORT (never reaches step 3)
//   3. bidirectional substring scan    → PARTIAL / AMBIGUOUS / NOT_FOUND

use crate::error::{HoldingsError, Result};
use crate::text::{digits_only, fold_fullwidth_alnum};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, warn};

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Corporate-form tokens (株式会社 = "incorporated"), stripped wherever they occur
const CORPORATE_SUFFIXES: [&str; 6] = ["株式会社", "（株）", "(株)", "㈱", "有限会社", "合同会社"];

/// Group holding-company spellings, longest first
const GROUP_SUFFIXES: [&str; 2] = ["ホールディングス", "ホールディング"];

fn standalone_hd() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\bHD\b").expect("HD pattern is valid"))
}

fn normalize_once(name: &str) -> String {
    let mut s: String = name.trim().chars().filter(|c| !c.is_whitespace()).collect();

    for token in CORPORATE_SUFFIXES {
        s = s.replace(token, "");
    }

    let s = s.replace('（', "(").replace('）', ")");
    let s = fold_fullwidth_alnum(&s.to_uppercase());

    let mut s = s;
    for token in GROUP_SUFFIXES {
        s = s.replace(token, "");
    }
    let mut s = standalone_hd().replace_all(&s, "").into_owned();
    if s.ends_with("HD") {
        s.truncate(s.len() - 2);
    }

    s
}

/// Normalized key used for matching.
///
/// Whitespace-free (incl. U+3000), corporate forms stripped, brackets
/// canonicalized, uppercased, width-folded, holding suffix stripped.
/// Applied until nothing changes, so `normalize(normalize(x)) == normalize(x)`.
pub fn normalize(name: &str) -> String {
    let mut current = normalize_once(name);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

// ============================================================================
// RESULT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Exact,
    Partial,
    Ambiguous,
    NotFound,
    TooShort,
    /// Code printed in the source document; resolver bypassed
    FromDocument,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Exact => "EXACT",
            MatchStatus::Partial => "PARTIAL",
            MatchStatus::Ambiguous => "AMBIGUOUS",
            MatchStatus::NotFound => "NOT_FOUND",
            MatchStatus::TooShort => "TOO_SHORT",
            MatchStatus::FromDocument => "FROM_DOCUMENT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionResult {
    pub code: Option<String>,
    pub status: MatchStatus,

    /// Distinct codes hit by the substring scan (operator review)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

impl ResolutionResult {
    fn with_code(code: &str, status: MatchStatus) -> Self {
        ResolutionResult {
            code: Some(code.to_string()),
            status,
            candidates: Vec::new(),
        }
    }

    fn without_code(status: MatchStatus) -> Self {
        ResolutionResult {
            code: None,
            status,
            candidates: Vec::new(),
        }
    }

    /// Code taken verbatim from the document
    pub fn from_document(code: &str) -> Self {
        Self::with_code(code, MatchStatus::FromDocument)
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// ReferenceEntry - one row of the reference dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEntry {
    pub code: String,
    pub raw_name: String,
    pub normalized_name: String,
}

/// Header names of the registry's required fields
#[derive(Debug, Clone)]
pub struct RegistryFields {
    pub code: String,
    pub name: String,
}

impl Default for RegistryFields {
    fn default() -> Self {
        RegistryFields {
            code: "code".to_string(),
            name: "name".to_string(),
        }
    }
}

/// Registry - normalized name → code, plus the scan list for partial matches.
/// Built once per run, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    exact: HashMap<String, String>,
    entries: Vec<ReferenceEntry>,
}

impl Registry {
    /// Build from (code, name) pairs. Codes are reduced to 4 digits;
    /// rows with a bad code, empty name or empty normalized name are dropped.
    pub fn from_rows<I, C, N>(rows: I) -> Self
    where
        I: IntoIterator<Item = (C, N)>,
        C: AsRef<str>,
        N: AsRef<str>,
    {
        let mut registry = Registry::default();

        for (code, name) in rows {
            let code: String = digits_only(code.as_ref()).chars().take(4).collect();
            let name = name.as_ref().trim();
            if code.len() != 4 || name.is_empty() {
                continue;
            }

            let normalized = normalize(name);
            if normalized.is_empty() {
                continue;
            }

            // Later rows win the exact index
            registry.exact.insert(normalized.clone(), code.clone());
            registry.entries.push(ReferenceEntry {
                code,
                raw_name: name.to_string(),
                normalized_name: normalized,
            });
        }

        registry
    }

    /// Load delimited rows with a header. Missing required headers is fatal.
    pub fn from_reader<R: Read>(reader: R, fields: &RegistryFields) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        let find = |field: &str| headers.iter().position(|h| h == field);
        let (code_idx, name_idx) = match (find(&fields.code), find(&fields.name)) {
            (Some(c), Some(n)) => (c, n),
            _ => {
                return Err(HoldingsError::Configuration(format!(
                    "registry must have headers '{}' and '{}' (got {:?})",
                    fields.code, fields.name, headers
                )))
            }
        };

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push((
                record.get(code_idx).unwrap_or("").to_string(),
                record.get(name_idx).unwrap_or("").to_string(),
            ));
        }

        let registry = Registry::from_rows(rows);
        debug!(entries = registry.len(), exact_keys = registry.exact_keys(), "registry loaded");
        Ok(registry)
    }

    pub fn from_path<P: AsRef<Path>>(path: P, fields: &RegistryFields) -> Result<Self> {
        let file = File::open(path.as_ref()).map_err(|e| {
            HoldingsError::Configuration(format!(
                "failed to open registry {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_reader(file, fields)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn exact_keys(&self) -> usize {
        self.exact.len()
    }

    pub fn entries(&self) -> &[ReferenceEntry] {
        &self.entries
    }

    /// Resolve a display name (see module header for the tiers)
    pub fn resolve(&self, name: &str) -> ResolutionResult {
        let key = normalize(name);

        if let Some(code) = self.exact.get(&key) {
            return ResolutionResult::with_code(code, MatchStatus::Exact);
        }

        // Short keys only ever match exactly
        if key.chars().count() <= 2 {
            return ResolutionResult::without_code(MatchStatus::TooShort);
        }

        let mut codes: Vec<String> = Vec::new();
        for entry in &self.entries {
            let hit = entry.normalized_name.contains(key.as_str())
                || key.contains(entry.normalized_name.as_str());
            if hit && !codes.contains(&entry.code) {
                codes.push(entry.code.clone());
            }
        }

        match codes.len() {
            0 => ResolutionResult::without_code(MatchStatus::NotFound),
            1 => ResolutionResult::with_code(&codes[0], MatchStatus::Partial),
            _ => {
                warn!(name, key = %key, candidates = ?codes, "ambiguous match, left unresolved");
                ResolutionResult {
                    code: None,
                    status: MatchStatus::Ambiguous,
                    candidates: codes,
                }
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;

    /// Fragments that exercise every normalization step and their overlaps
    const FRAGMENTS: &[&str] = &[
        "株式会社", "株", "式", "会社", "(株)", "（株）", "㈱", "有限会社", "合同会社",
        "(", ")", "（", "）", "ホールディングス", "ホールディング", "ホ", "ス",
        "HD", "ＨＤ", "hd", "ｈｄ", "H", "D", "Ｈ", "Ｄ", "\u{3000}", " ", "\t",
        "A", "ａ", "Ｚ", "x", "1", "１", "９", "・", "&", "トヨタ", "自動車",
    ];

    fn fragment_string() -> impl Strategy<Value = String> {
        prop::collection::vec(prop::sample::select(FRAGMENTS), 0..16).prop_map(|parts| parts.concat())
    }

    /// ASCII alphanumerics shifted into the full-width block
    fn to_fullwidth(s: &str) -> String {
        s.chars()
            .map(|c| char::from_u32(c as u32 + 0xFEE0).unwrap_or(c))
            .collect()
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent_over_fragments(name in fragment_string()) {
            let once = normalize(&name);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_normalize_idempotent_over_any_text(name in "\\PC{0,24}") {
            let once = normalize(&name);
            prop_assert_eq!(normalize(&once), once);
        }

        #[test]
        fn prop_fullwidth_alnum_folds_to_ascii(name in "[A-Za-z0-9]{1,12}") {
            prop_assert_eq!(normalize(&to_fullwidth(&name)), normalize(&name));
        }

        #[test]
        fn prop_corporate_form_is_ignored(
            name in "[ァ-ヶ]{3,8}",
            suffix in prop::sample::select(CORPORATE_SUFFIXES.to_vec()),
        ) {
            prop_assert_eq!(normalize(&format!("{}{}", name, suffix)), normalize(&name));
            prop_assert_eq!(normalize(&format!("{}{}", suffix, name)), normalize(&name));
        }
    }

    fn registry() -> Registry {
        Registry::from_rows(vec![
            ("7203", "トヨタ自動車株式会社"),
            ("3116", "トヨタ紡織"),
            ("6758", "ソニーグループ"),
            ("4452", "花王"),
            ("6498", "キッツ"),
            ("8306", "三菱ＵＦＪフィナンシャル・グループ"),
            ("5020", "ＥＮＥＯＳホールディングス"),
        ])
    }

    #[test]
    fn test_normalize_idempotent() {
        let samples = [
            "",
            "  トヨタ自動車　株式会社 ",
            "（株）ＡＢＣ",
            "株株式会社式会社",
            "(株）ソニー",
            "ｈｄ",
            "XHDホールディングス",
            "ホールディングＨＤス",
            "Straße",
            "三菱ＵＦＪ（フィナンシャル）",
            "ABC HD",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_normalize_fullwidth() {
        assert_eq!(normalize("ＡＢＣ１２３"), normalize("ABC123"));
        assert_eq!(normalize("ａｂｃ"), "ABC");
    }

    #[test]
    fn test_normalize_corporate_suffix() {
        assert_eq!(normalize("トヨタ自動車株式会社"), normalize("トヨタ自動車"));
        assert_eq!(normalize("株式会社 キッツ"), "キッツ");
        assert_eq!(normalize("ソニー(株)"), "ソニー");
        assert_eq!(normalize("ソニー（株）"), "ソニー");
    }

    #[test]
    fn test_normalize_brackets_and_whitespace() {
        assert_eq!(normalize("日本 （ＡＢ） 製作所"), "日本(AB)製作所");
        assert_eq!(normalize("a\u{3000}b\tc"), "ABC");
    }

    #[test]
    fn test_normalize_holding_suffix() {
        assert_eq!(normalize("ＥＮＥＯＳホールディングス"), "ENEOS");
        assert_eq!(normalize("ENEOS HD"), "ENEOS");
        assert_eq!(normalize("ENEOSＨＤ"), "ENEOS");
        assert_eq!(normalize("セブン&アイ・HD"), "セブン&アイ・");
        // HD inside a word is kept
        assert_eq!(normalize("HDMI"), "HDMI");
    }

    #[test]
    fn test_resolve_exact() {
        let result = registry().resolve("トヨタ自動車");
        assert_eq!(result.status, MatchStatus::Exact);
        assert_eq!(result.code, Some("7203".to_string()));
    }

    #[test]
    fn test_resolve_exact_short_name_beats_guard() {
        let result = registry().resolve("花王");
        assert_eq!(result.status, MatchStatus::Exact);
        assert_eq!(result.code, Some("4452".to_string()));
    }

    #[test]
    fn test_resolve_too_short_overrides_substring_hits() {
        // "ソニ" is a substring of ソニーグループ, but the guard wins
        let result = registry().resolve("ソニ");
        assert_eq!(result.status, MatchStatus::TooShort);
        assert_eq!(result.code, None);

        let result = registry().resolve("トヨ");
        assert_eq!(result.status, MatchStatus::TooShort);
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn test_resolve_partial_both_directions() {
        let result = registry().resolve("トヨタ自動");
        assert_eq!(result.status, MatchStatus::Partial);
        assert_eq!(result.code, Some("7203".to_string()));

        let result = registry().resolve("キッツ工業");
        assert_eq!(result.status, MatchStatus::Partial);
        assert_eq!(result.code, Some("6498".to_string()));
    }

    #[test]
    fn test_resolve_ambiguous() {
        let result = registry().resolve("トヨタ");
        assert_eq!(result.status, MatchStatus::Ambiguous);
        assert_eq!(result.code, None);
        assert_eq!(result.candidates, vec!["7203".to_string(), "3116".to_string()]);
    }

    #[test]
    fn test_resolve_same_code_twice_is_partial() {
        let registry = Registry::from_rows(vec![("7203", "トヨタ自動車"), ("7203", "トヨタ自動車(旧)")]);
        let result = registry.resolve("トヨタ自");
        assert_eq!(result.status, MatchStatus::Partial);
        assert_eq!(result.code, Some("7203".to_string()));
    }

    #[test]
    fn test_resolve_not_found() {
        let result = registry().resolve("任天堂");
        assert_eq!(result.status, MatchStatus::NotFound);
        assert_eq!(result.code, None);
    }

    #[test]
    fn test_resolve_fullwidth_registry_name() {
        let result = registry().resolve("三菱UFJフィナンシャル・グループ");
        assert_eq!(result.status, MatchStatus::Exact);
        assert_eq!(result.code, Some("8306".to_string()));

        let result = registry().resolve("ENEOS HD");
        assert_eq!(result.status, MatchStatus::Exact);
    }

    #[test]
    fn test_from_reader_discards_bad_rows() {
        let csv = "\u{feff}code,name,market\n\
                   7203.T,トヨタ自動車,Prime\n\
                   6758,ソニーグループ株式会社,Prime\n\
                   12,短いコード,Prime\n\
                   9984,,Prime\n\
                   1301,株式会社,Prime\n";

        let registry = Registry::from_reader(csv.as_bytes(), &RegistryFields::default()).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.entries()[0].code, "7203");
        assert_eq!(registry.entries()[1].normalized_name, "ソニーグループ");
        assert_eq!(registry.entries()[1].raw_name, "ソニーグループ株式会社");
    }

    #[test]
    fn test_from_reader_long_code_truncated() {
        let csv = "name,code\nトヨタ自動車,72030\n";
        let registry = Registry::from_reader(csv.as_bytes(), &RegistryFields::default()).unwrap();
        assert_eq!(registry.resolve("トヨタ自動車").code, Some("7203".to_string()));
    }

    #[test]
    fn test_from_reader_missing_header_is_configuration_error() {
        let csv = "ticker,name\n7203,トヨタ自動車\n";
        let result = Registry::from_reader(csv.as_bytes(), &RegistryFields::default());
        assert!(matches!(result, Err(HoldingsError::Configuration(_))));
    }

    #[test]
    fn test_custom_field_names() {
        let csv = "ticker,company\n7203,トヨタ自動車\n";
        let fields = RegistryFields {
            code: "ticker".to_string(),
            name: "company".to_string(),
        };
        let registry = Registry::from_reader(csv.as_bytes(), &fields).unwrap();
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "code,name").unwrap();
        writeln!(file, "6861,キーエンス").unwrap();

        let registry = Registry::from_path(file.path(), &RegistryFields::default()).unwrap();
        assert_eq!(registry.resolve("キーエンス").status, MatchStatus::Exact);

        let missing = Registry::from_path("/nonexistent/master.csv", &RegistryFields::default());
        assert!(matches!(missing, Err(HoldingsError::Configuration(_))));
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(MatchStatus::FromDocument.as_str(), "FROM_DOCUMENT");
        assert_eq!(
            serde_json::to_string(&MatchStatus::TooShort).unwrap(),
            "\"TOO_SHORT\""
        );
        let result = ResolutionResult::from_document("7203");
        assert_eq!(result.status, MatchStatus::FromDocument);
        assert_eq!(result.code, Some("7203".to_string()));
    }
}
