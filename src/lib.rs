// Holdings Scan - Core Library
// Exposes all modules for use in the CLI and tests

pub mod config;
pub mod document;
pub mod driver;
pub mod error;
pub mod extractors;
pub mod locator;
pub mod report;
pub mod resolver;
pub mod text;
pub mod transport;

// Re-export commonly used types
pub use config::{
    ExtractionConfig, ExtractorKind, FundCatalog, FundSource, LocatorKind, LoggingConfig,
    MarkupAliases, RunSettings,
};
pub use document::{
    AutoRenderer, DocumentForm, DocumentRenderer, PageDumpRenderer, PdfRenderer,
    RenderedPage, ReportArtifact, ReportDocument, RuledTable,
};
pub use driver::Driver;
pub use error::{HoldingsError, Result};
pub use extractors::{
    get_extractor, ExtractorRegistry, HoldingCandidate, HoldingsExtractor,
    LinePatternExtractor, RuledTableExtractor, StructuredMarkupExtractor,
};
pub use locator::{
    get_locator, ArtifactLocator, CatalogScanLocator, LocatedArtifact, PredictiveProbeLocator,
};
pub use report::{FundOutcome, FundStatus, HoldingRecord, RunReport, Stage};
pub use resolver::{
    normalize, MatchStatus, ReferenceEntry, Registry, RegistryFields, ResolutionResult,
};
pub use transport::{HttpTransport, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
