// ⚠️ Error Model - one enum for every failure the pipeline can raise
//
// Fund-scoped:  RemoteFetch, NoCandidates, Document
// Run-scoped:   Configuration (fatal, raised before the fund loop)

use thiserror::Error;

/// Errors raised by the locator, extractors, registry loader and transport.
///
/// Empty extraction is NOT an error - extractors return `Ok(vec![])` and the
/// driver records the fund as skipped.
#[derive(Debug, Error)]
pub enum HoldingsError {
    /// Network failure, timeout, or non-success HTTP status.
    #[error("remote fetch failed for {url}: {reason}")]
    RemoteFetch { url: String, reason: String },

    /// Locator found nothing matching its filter (or exhausted its probe window).
    #[error("no candidates: {0}")]
    NoCandidates(String),

    /// Artifact could not be rendered/parsed into the form an extractor needs.
    #[error("document error: {0}")]
    Document(String),

    /// Invalid registry headers or fund catalog. Aborts the whole run.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl HoldingsError {
    pub fn remote_fetch(url: &str, reason: impl ToString) -> Self {
        HoldingsError::RemoteFetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that must abort the run instead of a single fund.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HoldingsError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, HoldingsError>;
