// ⚙️ Configuration - Fund catalog as data
// Loaded once at startup from JSON, never mutated afterwards

use crate::error::{HoldingsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

/// Placeholders accepted in predictive-probe URL templates
pub const TEMPLATE_PLACEHOLDERS: [&str; 4] = ["{yyyymm}", "{yyyy}", "{mm}", "{m}"];

/// Default trigger for line-pattern reports (組入上位10銘柄 = "top 10 holdings")
pub const DEFAULT_TRIGGER: &str = "組入上位10銘柄";

/// Default lines that close the holdings block in line-pattern reports
pub const DEFAULT_STOP_KEYWORDS: [&str; 3] = ["当レポートは", "(1/8)", "ご注意"];

pub const DEFAULT_LINK_SUFFIX: &str = ".pdf";
pub const DEFAULT_PROBE_WINDOW: u32 = 3;

// ============================================================================
// STRATEGY KINDS
// ============================================================================

/// How the latest artifact for a fund is discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorKind {
    /// Scan an index page for dated links
    CatalogScan,

    /// Probe month-parameterized URLs backwards from last month
    PredictiveProbe,
}

impl LocatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            LocatorKind::CatalogScan => "catalog_scan",
            LocatorKind::PredictiveProbe => "predictive_probe",
        }
    }
}

/// How holdings are pulled out of the artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Regex over rendered PDF text lines
    LinePattern,

    /// Bordered tables from a page dump
    RuledTable,

    /// Parsed HTML (tables, dl blocks, script payloads)
    StructuredMarkup,
}

impl ExtractorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExtractorKind::LinePattern => "line_pattern",
            ExtractorKind::RuledTable => "ruled_table",
            ExtractorKind::StructuredMarkup => "structured_markup",
        }
    }
}

// ============================================================================
// MARKUP ALIASES
// ============================================================================

/// Header/label/key spellings recognized by the structured-markup extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupAliases {
    /// Substrings identifying the holding-name column or label
    pub name_headers: Vec<String>,

    /// Substrings identifying the security-code column or label
    pub code_headers: Vec<String>,

    /// Substrings identifying a dedicated rank column
    pub rank_headers: Vec<String>,

    /// Script payload keys carrying the holding name
    pub name_keys: Vec<String>,

    /// Script payload keys carrying the security code
    pub code_keys: Vec<String>,

    /// Maximum characters allowed between a name pair and a code pair
    pub script_gap: usize,
}

impl Default for MarkupAliases {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }

        MarkupAliases {
            name_headers: owned(&["銘柄名", "銘柄", "名称"]),
            code_headers: owned(&["コード", "証券コード", "銘柄コード"]),
            rank_headers: owned(&["順位", "No"]),
            name_keys: owned(&["name", "stockName", "brandName", "meigara"]),
            code_keys: owned(&["code", "stockCode", "securityCode", "ticker"]),
            script_gap: 200,
        }
    }
}

// ============================================================================
// FUND SOURCE
// ============================================================================

/// FundSource - immutable descriptor of one tracked fund
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundSource {
    pub id: String,

    /// Display name (logging only)
    #[serde(default)]
    pub name: Option<String>,

    /// Index page URL (catalog-scan) or URL template (predictive-probe)
    pub url: String,

    pub locator: LocatorKind,
    pub extractor: ExtractorKind,

    // Optional - defaults depend on the kinds above
    #[serde(default)]
    pub trigger: Option<String>,
    #[serde(default)]
    pub skip_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub stop_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub link_path_filter: Option<String>,
    #[serde(default)]
    pub link_suffix: Option<String>,
    #[serde(default)]
    pub probe_window: Option<u32>,
    #[serde(default)]
    pub markup: Option<MarkupAliases>,
}

impl FundSource {
    /// Minimal descriptor; optional fields fall back to kind defaults
    pub fn new(id: &str, url: &str, locator: LocatorKind, extractor: ExtractorKind) -> Self {
        FundSource {
            id: id.to_string(),
            name: None,
            url: url.to_string(),
            locator,
            extractor,
            trigger: None,
            skip_keywords: None,
            stop_keywords: None,
            link_path_filter: None,
            link_suffix: None,
            probe_window: None,
            markup: None,
        }
    }

    /// Required href substring for catalog-scan (empty = any link)
    pub fn link_path_filter(&self) -> &str {
        self.link_path_filter.as_deref().unwrap_or("")
    }

    pub fn link_suffix(&self) -> &str {
        self.link_suffix.as_deref().unwrap_or(DEFAULT_LINK_SUFFIX)
    }

    pub fn probe_window(&self) -> u32 {
        self.probe_window.unwrap_or(DEFAULT_PROBE_WINDOW)
    }

    /// Resolve extraction settings, filling per-kind defaults
    pub fn extraction_config(&self) -> ExtractionConfig {
        let line_pattern = self.extractor == ExtractorKind::LinePattern;

        let trigger = match (&self.trigger, line_pattern) {
            (Some(t), _) => t.clone(),
            (None, true) => DEFAULT_TRIGGER.to_string(),
            (None, false) => String::new(),
        };

        let stop_keywords = match (&self.stop_keywords, line_pattern) {
            (Some(k), _) => k.clone(),
            (None, true) => DEFAULT_STOP_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            (None, false) => Vec::new(),
        };

        ExtractionConfig {
            trigger,
            skip_keywords: self.skip_keywords.clone().unwrap_or_default(),
            stop_keywords,
            markup: self.markup.clone().unwrap_or_default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(HoldingsError::Configuration(
                "fund id must not be empty".to_string(),
            ));
        }

        if self.url.trim().is_empty() {
            return Err(HoldingsError::Configuration(format!(
                "fund '{}' has an empty url",
                self.id
            )));
        }

        if self.locator == LocatorKind::PredictiveProbe {
            if !TEMPLATE_PLACEHOLDERS.iter().any(|p| self.url.contains(p)) {
                return Err(HoldingsError::Configuration(format!(
                    "fund '{}': predictive_probe url needs one of {:?}",
                    self.id, TEMPLATE_PLACEHOLDERS
                )));
            }
            if self.probe_window() == 0 {
                return Err(HoldingsError::Configuration(format!(
                    "fund '{}': probe_window must be at least 1",
                    self.id
                )));
            }
        }

        Ok(())
    }
}

/// Extraction settings with every default resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub trigger: String,
    pub skip_keywords: Vec<String>,
    pub stop_keywords: Vec<String>,
    pub markup: MarkupAliases,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            trigger: DEFAULT_TRIGGER.to_string(),
            skip_keywords: Vec::new(),
            stop_keywords: DEFAULT_STOP_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            markup: MarkupAliases::default(),
        }
    }
}

// ============================================================================
// RUN SETTINGS & LOGGING
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub user_agent: String,

    /// Existence checks (predictive-probe)
    pub exists_timeout_secs: u64,

    /// Index pages (catalog-scan)
    pub index_timeout_secs: u64,

    /// Report documents
    pub download_timeout_secs: u64,
}

impl RunSettings {
    pub fn exists_timeout(&self) -> Duration {
        Duration::from_secs(self.exists_timeout_secs)
    }

    pub fn index_timeout(&self) -> Duration {
        Duration::from_secs(self.index_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        RunSettings {
            user_agent: format!("holdings-scan/{}", env!("CARGO_PKG_VERSION")),
            exists_timeout_secs: 10,
            index_timeout_secs: 30,
            download_timeout_secs: 60,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    /// Initialize the tracing subscriber. Logs go to stderr so records can own stdout.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format.as_str() {
            "json" => {
                fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
            _ => {
                fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ============================================================================
// FUND CATALOG
// ============================================================================

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    settings: RunSettings,
    #[serde(default)]
    logging: LoggingConfig,
    funds: Vec<FundSource>,
}

/// FundCatalog - the validated, ordered list of funds for one run
#[derive(Debug, Clone)]
pub struct FundCatalog {
    settings: RunSettings,
    logging: LoggingConfig,
    funds: Vec<FundSource>,
}

impl FundCatalog {
    /// Build and validate a catalog. Declaration order is preserved.
    pub fn new(settings: RunSettings, funds: Vec<FundSource>) -> Result<Self> {
        let mut seen = HashSet::new();
        for fund in &funds {
            fund.validate()?;
            if !seen.insert(fund.id.as_str()) {
                return Err(HoldingsError::Configuration(format!(
                    "duplicate fund id '{}'",
                    fund.id
                )));
            }
        }

        Ok(FundCatalog {
            settings,
            logging: LoggingConfig::default(),
            funds,
        })
    }

    /// Load catalog from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            HoldingsError::Configuration(format!(
                "failed to read fund catalog {:?}: {}",
                path.as_ref(),
                e
            ))
        })?;

        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content).map_err(|e| {
            HoldingsError::Configuration(format!("failed to parse fund catalog JSON: {}", e))
        })?;

        let mut catalog = FundCatalog::new(file.settings, file.funds)?;
        catalog.logging = file.logging;
        Ok(catalog)
    }

    pub fn funds(&self) -> &[FundSource] {
        &self.funds
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    pub fn len(&self) -> usize {
        self.funds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funds.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================
