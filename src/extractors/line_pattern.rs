// 📝 Line Pattern Extractor - "{rank} {name} {ratio}%" lines after a trigger

use super::{HoldingCandidate, HoldingsExtractor, MAX_HOLDINGS};
use crate::config::{ExtractionConfig, ExtractorKind};
use crate::document::{DocumentForm, RenderedPage, ReportDocument};
use crate::error::Result;
use crate::text::fold_numeric_glyphs;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

fn holding_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // rank (1-2 digits), name (no digits, no %), ratio%
        Regex::new(r"([0-9]{1,2})\s+([^\d%]+?)\s+([0-9]+(?:\.[0-9]+)?)%")
            .expect("holding line pattern is valid")
    })
}

/// Concatenate page text and split into trimmed, non-blank lines
pub fn document_lines(pages: &[RenderedPage]) -> Vec<String> {
    pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct LinePatternExtractor;

impl LinePatternExtractor {
    pub fn new() -> Self {
        LinePatternExtractor
    }

    /// Scan lines for the holdings block.
    ///
    /// When a line carries two ranked columns side by side
    /// ("3 電気機器 5 キッツ 4.2%"), only the LAST match counts:
    /// the rightmost column holds the holding name.
    pub fn extract_from_lines<S: AsRef<str>>(
        &self,
        lines: &[S],
        config: &ExtractionConfig,
    ) -> Vec<HoldingCandidate> {
        let mut holdings: Vec<HoldingCandidate> = Vec::new();
        // An empty trigger means the block starts at the first line
        let mut in_block = config.trigger.is_empty();
        // "組入上位１０銘柄" and "組入上位10銘柄" both open the block
        let trigger = fold_numeric_glyphs(&config.trigger);

        for line in lines {
            let line = line.as_ref();
            let folded = fold_numeric_glyphs(line);

            if !in_block {
                if folded.contains(trigger.as_str()) {
                    in_block = true;
                }
                continue;
            }

            if config.stop_keywords.iter().any(|k| line.contains(k.as_str())) {
                break;
            }
            if config.skip_keywords.iter().any(|k| line.contains(k.as_str())) {
                continue;
            }

            let caps = match holding_line_pattern().captures_iter(&folded).last() {
                Some(c) => c,
                None => continue,
            };

            let rank = match caps[1].parse::<u8>() {
                Ok(r) if (1..=10).contains(&r) => r,
                _ => continue,
            };
            let name = caps[2].trim();
            if name.is_empty() {
                continue;
            }

            if holdings.iter().any(|h| h.display_name == name) {
                continue;
            }
            if holdings.iter().any(|h| h.rank == Some(rank)) {
                debug!(rank, name, "rank already taken, line skipped");
                continue;
            }

            holdings.push(HoldingCandidate::new(Some(rank), name));
            if holdings.len() >= MAX_HOLDINGS {
                break;
            }
        }

        holdings
    }
}

impl Default for LinePatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldingsExtractor for LinePatternExtractor {
    fn extract(
        &self,
        document: &ReportDocument,
        config: &ExtractionConfig,
    ) -> Result<Vec<HoldingCandidate>> {
        let lines = document_lines(document.pages()?);
        Ok(self.extract_from_lines(&lines, config))
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::LinePattern
    }

    fn form(&self) -> DocumentForm {
        DocumentForm::Pages
    }
}

// ============================================================================
// TESTS
// ============================================================================
