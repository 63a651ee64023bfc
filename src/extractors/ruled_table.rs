// 📊 Ruled Table Extractor - pick the table that looks most like a top-10 list
//
// Score = number of first-column cells that are bare integers 1..=10.
// Highest score wins per page; ties keep the first table.

use super::{squash_whitespace, HoldingCandidate, HoldingsExtractor, MAX_HOLDINGS};
use crate::config::{ExtractionConfig, ExtractorKind};
use crate::document::{DocumentForm, RenderedPage, ReportDocument, RuledTable};
use crate::error::Result;
use crate::text::parse_rank_number;
use tracing::debug;

fn first_cell_rank(row: &[Option<String>]) -> Option<u8> {
    row.first()
        .and_then(|c| c.as_deref())
        .and_then(parse_rank_number)
}

/// Count rows whose first cell is a rank
pub fn score_table(table: &RuledTable) -> usize {
    table
        .rows
        .iter()
        .filter(|row| first_cell_rank(row).is_some())
        .count()
}

/// Highest-scoring table with a non-zero score; first wins ties
pub fn select_table(tables: &[RuledTable]) -> Option<&RuledTable> {
    let mut best: Option<(&RuledTable, usize)> = None;
    for table in tables {
        let score = score_table(table);
        if score == 0 {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((table, score)),
        }
    }
    best.map(|(table, _)| table)
}

/// Name = second cell, or the first non-empty cell to its right.
/// Line breaks inside a cell are joined.
fn holding_name(row: &[Option<String>]) -> Option<String> {
    row.iter()
        .skip(1)
        .filter_map(|c| c.as_deref())
        .map(|c| squash_whitespace(&c.replace(['\n', '\r'], "")))
        .find(|c| !c.is_empty())
}

pub struct RuledTableExtractor;

impl RuledTableExtractor {
    pub fn new() -> Self {
        RuledTableExtractor
    }

    pub fn extract_from_pages(
        &self,
        pages: &[RenderedPage],
        config: &ExtractionConfig,
    ) -> Vec<HoldingCandidate> {
        let mut holdings: Vec<HoldingCandidate> = Vec::new();

        for (page_index, page) in pages.iter().enumerate() {
            let table = match select_table(&page.tables) {
                Some(t) => t,
                None => continue,
            };
            debug!(page = page_index + 1, score = score_table(table), "selected ruled table");

            for row in &table.rows {
                let rank = match first_cell_rank(row) {
                    Some(r) => r,
                    None => continue,
                };
                let name = match holding_name(row) {
                    Some(n) => n,
                    None => continue,
                };

                if config.skip_keywords.iter().any(|k| name.contains(k.as_str())) {
                    continue;
                }
                if holdings.iter().any(|h| h.display_name == name) {
                    continue;
                }
                if holdings.iter().any(|h| h.rank == Some(rank)) {
                    debug!(rank, name = %name, "rank already taken, row skipped");
                    continue;
                }

                holdings.push(HoldingCandidate::new(Some(rank), &name));
                if holdings.len() >= MAX_HOLDINGS {
                    return holdings;
                }
            }
        }

        holdings
    }
}

impl Default for RuledTableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldingsExtractor for RuledTableExtractor {
    fn extract(
        &self,
        document: &ReportDocument,
        config: &ExtractionConfig,
    ) -> Result<Vec<HoldingCandidate>> {
        Ok(self.extract_from_pages(document.pages()?, config))
    }

    fn kind(&self) -> ExtractorKind {
        ExtractorKind::RuledTable
    }

    fn form(&self) -> DocumentForm {
        DocumentForm::Pages
    }
}

// ============================================================================
// TESTS
// ============================================================================
