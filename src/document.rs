// 📄 Document Model - raw artifacts and the forms extractors consume
//
// Raw bytes/text  →  DocumentRenderer  →  pages (text + ruled tables)
// Raw HTML        →  scraper::Html      →  parsed markup

use crate::error::{HoldingsError, Result};
use chrono::NaiveDate;
use scraper::Html;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// ARTIFACT
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactContent {
    Bytes(Vec<u8>),
    Text(String),
}

/// ReportArtifact - one fetched report, created once per fund per run
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub url: String,
    pub report_date: Option<NaiveDate>,
    pub content: ArtifactContent,
}

// ============================================================================
// RENDERED PAGES
// ============================================================================

/// A bordered table: rows of cells, `None` for cells the renderer left empty
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuledTable {
    pub rows: Vec<Vec<Option<String>>>,
}

impl RuledTable {
    pub fn new(rows: Vec<Vec<Option<String>>>) -> Self {
        RuledTable { rows }
    }

    /// Convenience for literal tables; empty strings become `None`
    pub fn from_strs(rows: &[&[&str]]) -> Self {
        RuledTable {
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                        .collect()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedPage {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tables: Vec<RuledTable>,
}

impl RenderedPage {
    pub fn from_text(text: &str) -> Self {
        RenderedPage {
            text: text.to_string(),
            tables: Vec::new(),
        }
    }
}

/// Which form an extractor needs the document in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentForm {
    Pages,
    Markup,
}

/// ReportDocument - prepared input for an extractor
#[derive(Debug)]
pub enum ReportDocument {
    Pages(Vec<RenderedPage>),
    Markup(Html),
}

impl ReportDocument {
    pub fn from_markup(html: &str) -> Self {
        ReportDocument::Markup(Html::parse_document(html))
    }

    /// Convert a fetched artifact into the form an extractor asked for
    pub fn prepare(
        artifact: &ReportArtifact,
        form: DocumentForm,
        renderer: &dyn DocumentRenderer,
    ) -> Result<Self> {
        match (form, &artifact.content) {
            (DocumentForm::Pages, ArtifactContent::Bytes(bytes)) => {
                Ok(ReportDocument::Pages(renderer.render(bytes)?))
            }
            (DocumentForm::Pages, ArtifactContent::Text(text)) => {
                Ok(ReportDocument::Pages(renderer.render(text.as_bytes())?))
            }
            (DocumentForm::Markup, ArtifactContent::Text(text)) => Ok(Self::from_markup(text)),
            (DocumentForm::Markup, ArtifactContent::Bytes(bytes)) => {
                Ok(Self::from_markup(&String::from_utf8_lossy(bytes)))
            }
        }
    }

    pub fn pages(&self) -> Result<&[RenderedPage]> {
        match self {
            ReportDocument::Pages(pages) => Ok(pages),
            ReportDocument::Markup(_) => Err(HoldingsError::Document(
                "expected rendered pages, got markup".to_string(),
            )),
        }
    }

    pub fn markup(&self) -> Result<&Html> {
        match self {
            ReportDocument::Markup(html) => Ok(html),
            ReportDocument::Pages(_) => Err(HoldingsError::Document(
                "expected markup, got rendered pages".to_string(),
            )),
        }
    }
}

// ============================================================================
// RENDERERS
// ============================================================================

/// DocumentRenderer - turns artifact bytes into pages of text and tables
pub trait DocumentRenderer {
    fn render(&self, bytes: &[u8]) -> Result<Vec<RenderedPage>>;
}

/// PDF text renderer (lopdf). Produces page text only; ruled tables need a page dump.
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn render(&self, bytes: &[u8]) -> Result<Vec<RenderedPage>> {
        let doc = lopdf::Document::load_mem(bytes)
            .map_err(|e| HoldingsError::Document(format!("failed to load PDF: {}", e)))?;

        let mut pages = Vec::new();
        for page_number in doc.get_pages().keys() {
            // A page that fails to decode renders as empty text
            let text = match doc.extract_text(&[*page_number]) {
                Ok(text) => text,
                Err(e) => {
                    debug!(page = page_number, error = %e, "page text extraction failed");
                    String::new()
                }
            };
            pages.push(RenderedPage::from_text(&text));
        }

        Ok(pages)
    }
}

#[derive(Debug, Deserialize)]
struct PageDump {
    pages: Vec<RenderedPage>,
}

/// Pre-rendered page dump (JSON): `{"pages": [{"text": "...", "tables": [[["1", "..."]]]}]}`
///
/// Produced by an external layout renderer; the only source of ruled tables.
pub struct PageDumpRenderer;

impl DocumentRenderer for PageDumpRenderer {
    fn render(&self, bytes: &[u8]) -> Result<Vec<RenderedPage>> {
        let dump: PageDump = serde_json::from_slice(bytes)
            .map_err(|e| HoldingsError::Document(format!("invalid page dump: {}", e)))?;
        Ok(dump.pages)
    }
}

/// Sniffs the payload: `%PDF` → PdfRenderer, `{` → PageDumpRenderer
pub struct AutoRenderer;

impl DocumentRenderer for AutoRenderer {
    fn render(&self, bytes: &[u8]) -> Result<Vec<RenderedPage>> {
        let start = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(bytes.len());
        let head = &bytes[start..];

        if head.starts_with(b"%PDF") {
            PdfRenderer.render(bytes)
        } else if head.starts_with(b"{") {
            PageDumpRenderer.render(head)
        } else {
            Err(HoldingsError::Document(
                "unrecognized document format (expected PDF or page dump)".to_string(),
            ))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_dump_renderer() {
        let json = r#"{"pages": [
            {"text": "組入上位10銘柄\n1 トヨタ自動車 5.1%", "tables": [[["1", "トヨタ自動車", null]]]},
            {"text": ""}
        ]}"#;

        let pages = PageDumpRenderer.render(json.as_bytes()).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].tables.len(), 1);
        assert_eq!(pages[0].tables[0].rows[0][1], Some("トヨタ自動車".to_string()));
        assert_eq!(pages[0].tables[0].rows[0][2], None);
        assert!(pages[1].tables.is_empty());
    }

    #[test]
    fn test_auto_renderer_rejects_unknown() {
        let result = AutoRenderer.render(b"<html></html>");
        assert!(matches!(result, Err(HoldingsError::Document(_))));
    }

    #[test]
    fn test_auto_renderer_dispatches_dump() {
        let pages = AutoRenderer.render(b"  {\"pages\": [{\"text\": \"a\"}]}").unwrap();
        assert_eq!(pages, vec![RenderedPage::from_text("a")]);
    }

    #[test]
    fn test_broken_pdf_is_document_error() {
        let result = AutoRenderer.render(b"%PDF-1.4 truncated");
        assert!(matches!(result, Err(HoldingsError::Document(_))));
    }

    #[test]
    fn test_prepare_markup_from_text() {
        let artifact = ReportArtifact {
            url: "https://example.com/".to_string(),
            report_date: None,
            content: ArtifactContent::Text("<p>hi</p>".to_string()),
        };
        let doc = ReportDocument::prepare(&artifact, DocumentForm::Markup, &AutoRenderer).unwrap();

        assert!(doc.markup().is_ok());
        assert!(matches!(doc.pages(), Err(HoldingsError::Document(_))));
    }

    #[test]
    fn test_ruled_table_from_strs() {
        let table = RuledTable::from_strs(&[&["1", "", "トヨタ"]]);
        assert_eq!(table.rows[0], vec![Some("1".to_string()), None, Some("トヨタ".to_string())]);
    }
}
