// 🏗️ Extractor Framework - polymorphic holdings extraction
//
// Three strategies, one per document family:
// - LinePattern:      regex over rendered PDF text
// - RuledTable:       bordered tables from a page dump
// - StructuredMarkup: parsed HTML (tables → dl blocks → script payloads)
//
// All strategies are pure: (document, config) → candidates. No I/O.

pub mod line_pattern;
pub mod ruled_table;
pub mod structured_markup;

pub use line_pattern::LinePatternExtractor;
pub use ruled_table::RuledTableExtractor;
pub use structured_markup::StructuredMarkupExtractor;

use crate::config::{ExtractionConfig, ExtractorKind};
use crate::document::{DocumentForm, ReportDocument};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A top-10 list never has more than this many entries
pub const MAX_HOLDINGS: usize = 10;

// ============================================================================
// CORE TYPES
// ============================================================================

/// HoldingCandidate - one extracted holding, before resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingCandidate {
    /// 1..=10 when the document carries it
    pub rank: Option<u8>,

    pub display_name: String,

    /// Security code printed in the document itself (bypasses the resolver)
    pub source_code: Option<String>,
}

impl HoldingCandidate {
    pub fn new(rank: Option<u8>, display_name: &str) -> Self {
        HoldingCandidate {
            rank,
            display_name: display_name.to_string(),
            source_code: None,
        }
    }

    /// Builder pattern: attach a code taken from the document
    pub fn with_code(mut self, code: &str) -> Self {
        self.source_code = Some(code.to_string());
        self
    }
}

/// HoldingsExtractor - core trait, one implementation per ExtractorKind
///
/// Adding a document layout = implement this trait + register it.
/// The driver never changes.
pub trait HoldingsExtractor {
    /// Extract up to 10 ordered, deduplicated candidates.
    ///
    /// An empty `Vec` is a valid outcome (layout not recognized).
    fn extract(&self, document: &ReportDocument, config: &ExtractionConfig)
        -> Result<Vec<HoldingCandidate>>;

    fn kind(&self) -> ExtractorKind;

    /// Document form this strategy reads
    fn form(&self) -> DocumentForm;
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Get the built-in extractor for a kind
pub fn get_extractor(kind: ExtractorKind) -> Box<dyn HoldingsExtractor> {
    match kind {
        ExtractorKind::LinePattern => Box::new(LinePatternExtractor::new()),
        ExtractorKind::RuledTable => Box::new(RuledTableExtractor::new()),
        ExtractorKind::StructuredMarkup => Box::new(StructuredMarkupExtractor::new()),
    }
}

/// Strategy registry keyed by ExtractorKind
pub struct ExtractorRegistry {
    extractors: HashMap<ExtractorKind, Box<dyn HoldingsExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        ExtractorRegistry {
            extractors: HashMap::new(),
        }
    }

    /// Registry with every built-in strategy
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for kind in [
            ExtractorKind::LinePattern,
            ExtractorKind::RuledTable,
            ExtractorKind::StructuredMarkup,
        ] {
            registry.register(get_extractor(kind));
        }
        registry
    }

    /// Register (or replace) the strategy for its kind
    pub fn register(&mut self, extractor: Box<dyn HoldingsExtractor>) {
        self.extractors.insert(extractor.kind(), extractor);
    }

    pub fn get(&self, kind: ExtractorKind) -> Option<&dyn HoldingsExtractor> {
        self.extractors.get(&kind).map(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Collapse runs of whitespace (cells and labels often wrap)
pub(crate) fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_extractor_kinds_and_forms() {
        let line = get_extractor(ExtractorKind::LinePattern);
        assert_eq!(line.kind(), ExtractorKind::LinePattern);
        assert_eq!(line.form(), DocumentForm::Pages);

        let table = get_extractor(ExtractorKind::RuledTable);
        assert_eq!(table.kind(), ExtractorKind::RuledTable);
        assert_eq!(table.form(), DocumentForm::Pages);

        let markup = get_extractor(ExtractorKind::StructuredMarkup);
        assert_eq!(markup.kind(), ExtractorKind::StructuredMarkup);
        assert_eq!(markup.form(), DocumentForm::Markup);
    }

    #[test]
    fn test_registry_defaults() {
        let registry = ExtractorRegistry::with_defaults();
        assert_eq!(registry.len(), 3);
        assert!(registry.get(ExtractorKind::RuledTable).is_some());
        assert!(ExtractorRegistry::new().get(ExtractorKind::RuledTable).is_none());
    }

    #[test]
    fn test_candidate_builder() {
        let c = HoldingCandidate::new(Some(1), "トヨタ自動車").with_code("7203");
        assert_eq!(c.rank, Some(1));
        assert_eq!(c.source_code, Some("7203".to_string()));
    }

    #[test]
    fn test_squash_whitespace() {
        assert_eq!(squash_whitespace("  ソニー\n グループ "), "ソニー グループ");
    }
}
