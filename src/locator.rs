// 🔎 Locator - find "the latest" report artifact for a fund
// Two strategies: Catalog Scan (dated links on an index page) and
// Predictive Probe (month-parameterized URL, walk backwards)

use crate::config::{FundSource, LocatorKind, RunSettings};
use crate::error::{HoldingsError, Result};
use crate::text::fold_fullwidth_digits;
use crate::transport::Transport;
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::{debug, info};
use url::Url;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Where the latest artifact lives, and (if derivable) its report date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedArtifact {
    pub url: String,
    pub report_date: Option<NaiveDate>,
}

/// ArtifactLocator - one implementation per LocatorKind
pub trait ArtifactLocator {
    /// Find the latest artifact. Failures are scoped to this fund.
    fn locate(
        &self,
        fund: &FundSource,
        transport: &dyn Transport,
        settings: &RunSettings,
    ) -> Result<LocatedArtifact>;

    fn kind(&self) -> LocatorKind;
}

/// Factory: returns the locator for a kind.
///
/// `today` anchors the predictive-probe window (previous calendar month first).
pub fn get_locator(kind: LocatorKind, today: NaiveDate) -> Box<dyn ArtifactLocator> {
    match kind {
        LocatorKind::CatalogScan => Box::new(CatalogScanLocator::new()),
        LocatorKind::PredictiveProbe => Box::new(PredictiveProbeLocator::new(today)),
    }
}

// ============================================================================
// DATE GRAMMAR
// ============================================================================

fn explicit_day_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]{4})\s*年\s*([0-9]{1,2})\s*月\s*([0-9]{1,2})\s*日")
            .expect("explicit-day pattern is valid")
    })
}

fn month_end_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"([0-9]{4})\s*年\s*([0-9]{1,2})\s*月\s*末")
            .expect("month-end pattern is valid")
    })
}

/// Last calendar day of a month
pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)?.pred_opt()
}

/// Parse a report date out of link text.
///
/// Grammars (tried in order):
/// - "2024年2月29日" → 2024-02-29
/// - "2024年2月末"   → last day of February 2024
///
/// Impossible dates ("2024年2月30日") count as unparseable.
pub fn parse_report_date(text: &str) -> Option<NaiveDate> {
    let text = fold_fullwidth_digits(text.trim());

    if let Some(caps) = explicit_day_pattern().captures(&text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        let day = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = month_end_pattern().captures(&text) {
        let year = caps[1].parse().ok()?;
        let month = caps[2].parse().ok()?;
        return month_end(year, month);
    }

    None
}

// ============================================================================
// CATALOG SCAN
// ============================================================================

/// A hyperlink that survived the path/suffix filter
#[derive(Debug, Clone, PartialEq)]
pub struct LinkCandidate {
    pub url: String,
    pub text: String,
    pub date: Option<NaiveDate>,
}

/// Collect `<a href>` links whose href contains `path_filter` and ends with `suffix`.
/// Relative hrefs are resolved against `base_url`.
pub fn collect_links(html: &str, base_url: &str, path_filter: &str, suffix: &str) -> Vec<LinkCandidate> {
    let document = Html::parse_document(html);
    let anchors = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let base = Url::parse(base_url).ok();
    let suffix_lower = suffix.to_lowercase();

    let mut candidates = Vec::new();
    for anchor in document.select(&anchors) {
        let href = anchor.value().attr("href").unwrap_or("").trim();
        if href.is_empty() {
            continue;
        }
        if !href.contains(path_filter) {
            continue;
        }
        if !href.to_lowercase().ends_with(&suffix_lower) {
            continue;
        }

        // Visible text, whitespace-joined
        let text = anchor
            .text()
            .flat_map(|t| t.split_whitespace())
            .collect::<Vec<_>>()
            .join(" ");

        let url = base
            .as_ref()
            .and_then(|b| b.join(href).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| href.to_string());

        let date = parse_report_date(&text);
        candidates.push(LinkCandidate { url, text, date });
    }

    candidates
}

/// Latest parsed date wins; unparseable is older than any date;
/// first-encountered wins ties.
pub fn select_latest(candidates: &[LinkCandidate]) -> Option<&LinkCandidate> {
    let mut best: Option<&LinkCandidate> = None;
    for candidate in candidates {
        match best {
            // Option ordering: None < Some(_)
            Some(current) if candidate.date <= current.date => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Catalog Scan - pick the newest dated link from an index page
pub struct CatalogScanLocator;

impl CatalogScanLocator {
    pub fn new() -> Self {
        CatalogScanLocator
    }
}

impl Default for CatalogScanLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactLocator for CatalogScanLocator {
    fn locate(
        &self,
        fund: &FundSource,
        transport: &dyn Transport,
        settings: &RunSettings,
    ) -> Result<LocatedArtifact> {
        let html = transport.fetch_text(&fund.url, settings.index_timeout())?;
        let candidates = collect_links(&html, &fund.url, fund.link_path_filter(), fund.link_suffix());

        if candidates.is_empty() {
            return Err(HoldingsError::NoCandidates(format!(
                "no links matching filter '{}' with suffix '{}' on {}",
                fund.link_path_filter(),
                fund.link_suffix(),
                fund.url
            )));
        }

        for (i, c) in candidates.iter().take(10).enumerate() {
            debug!(fund_id = %fund.id, index = i + 1, date = ?c.date, url = %c.url, text = %c.text, "link candidate");
        }

        let latest = select_latest(&candidates)
            .ok_or_else(|| HoldingsError::NoCandidates(fund.url.clone()))?;

        info!(fund_id = %fund.id, url = %latest.url, report_date = ?latest.date, "selected latest artifact");

        Ok(LocatedArtifact {
            url: latest.url.clone(),
            report_date: latest.date,
        })
    }

    fn kind(&self) -> LocatorKind {
        LocatorKind::CatalogScan
    }
}

// ============================================================================
// PREDICTIVE PROBE
// ============================================================================

/// Fill a month template: {yyyymm}, {yyyy}, {mm}, {m}
pub fn format_template(template: &str, year: i32, month: u32) -> String {
    template
        .replace("{yyyymm}", &format!("{:04}{:02}", year, month))
        .replace("{yyyy}", &format!("{:04}", year))
        .replace("{mm}", &format!("{:02}", month))
        .replace("{m}", &month.to_string())
}

/// The (year, month) `n` months before the month of `date`
fn months_before(date: NaiveDate, n: u32) -> (i32, u32) {
    let index = date.year() * 12 + date.month0() as i32 - n as i32;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Predictive Probe - guess URLs for recent months, newest first
pub struct PredictiveProbeLocator {
    today: NaiveDate,
}

impl PredictiveProbeLocator {
    pub fn new(today: NaiveDate) -> Self {
        PredictiveProbeLocator { today }
    }
}

impl ArtifactLocator for PredictiveProbeLocator {
    fn locate(
        &self,
        fund: &FundSource,
        transport: &dyn Transport,
        settings: &RunSettings,
    ) -> Result<LocatedArtifact> {
        let window = fund.probe_window();

        // Previous calendar month first; the current month is never published yet
        for step in 1..=window {
            let (year, month) = months_before(self.today, step);
            let url = format_template(&fund.url, year, month);

            if transport.exists(&url, settings.exists_timeout()) {
                let report_date = month_end(year, month);
                info!(fund_id = %fund.id, url = %url, report_date = ?report_date, "probe hit");
                return Ok(LocatedArtifact { url, report_date });
            }
            debug!(fund_id = %fund.id, url = %url, "probe miss");
        }

        Err(HoldingsError::NoCandidates(format!(
            "no artifact found in the last {} months for template {}",
            window, fund.url
        )))
    }

    fn kind(&self) -> LocatorKind {
        LocatorKind::PredictiveProbe
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorKind;
    use crate::transport::testing::FakeTransport;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_explicit_day() {
        assert_eq!(parse_report_date("2024年1月31日"), Some(date(2024, 1, 31)));
        assert_eq!(parse_report_date("月報 2024 年 3 月 5 日 基準"), Some(date(2024, 3, 5)));
        assert_eq!(parse_report_date("２０２４年２月２９日"), Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_parse_month_end() {
        assert_eq!(parse_report_date("2024年2月末"), Some(date(2024, 2, 29)));
        assert_eq!(parse_report_date("2023年2月末"), Some(date(2023, 2, 28)));
        assert_eq!(parse_report_date("2023年12月末"), Some(date(2023, 12, 31)));
    }

    #[test]
    fn test_parse_unparseable() {
        assert_eq!(parse_report_date("月次レポート"), None);
        assert_eq!(parse_report_date("2024年2月30日"), None);
        assert_eq!(parse_report_date(""), None);
    }

    #[test]
    fn test_select_latest_february_wins() {
        let html = r#"
            <ul>
              <li><a href="/data/fund_pdf/monthly/a.pdf">2024年1月31日</a></li>
              <li><a href="/data/fund_pdf/monthly/b.pdf">2024年2月29日</a></li>
              <li><a href="/data/fund_pdf/monthly/c.pdf">月次レポート</a></li>
            </ul>"#;

        let links = collect_links(html, "https://example.com/fund/1/", "/data/fund_pdf/monthly/", ".pdf");
        assert_eq!(links.len(), 3);

        let latest = select_latest(&links).unwrap();
        assert_eq!(latest.url, "https://example.com/data/fund_pdf/monthly/b.pdf");
        assert_eq!(latest.date, Some(date(2024, 2, 29)));
    }

    #[test]
    fn test_select_latest_ties_keep_first() {
        let links = vec![
            LinkCandidate { url: "first".into(), text: String::new(), date: Some(date(2024, 1, 31)) },
            LinkCandidate { url: "second".into(), text: String::new(), date: Some(date(2024, 1, 31)) },
        ];
        assert_eq!(select_latest(&links).unwrap().url, "first");
    }

    #[test]
    fn test_select_latest_all_unparseable_keeps_first() {
        let links = vec![
            LinkCandidate { url: "first".into(), text: "x".into(), date: None },
            LinkCandidate { url: "second".into(), text: "y".into(), date: None },
        ];
        assert_eq!(select_latest(&links).unwrap().url, "first");
        assert!(select_latest(&[]).is_none());
    }

    #[test]
    fn test_collect_links_filters_path_and_suffix() {
        let html = r#"
            <a href="/data/fund_pdf/monthly/a.PDF">2024年1月末</a>
            <a href="/data/fund_pdf/other/b.pdf">2024年2月末</a>
            <a href="/data/fund_pdf/monthly/c.html">2024年3月末</a>
            <a href="">empty</a>"#;

        let links = collect_links(html, "https://example.com/", "/data/fund_pdf/monthly/", ".pdf");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://example.com/data/fund_pdf/monthly/a.PDF");
        assert_eq!(links[0].date, Some(date(2024, 1, 31)));
    }

    #[test]
    fn test_catalog_scan_no_candidates() {
        let mut fund = FundSource::new(
            "f1",
            "https://example.com/fund/",
            LocatorKind::CatalogScan,
            ExtractorKind::LinePattern,
        );
        fund.link_path_filter = Some("/monthly/".to_string());
        let transport = FakeTransport::new()
            .with_text("https://example.com/fund/", r#"<a href="/weekly/x.pdf">2024年1月末</a>"#);

        let result = CatalogScanLocator::new().locate(&fund, &transport, &RunSettings::default());
        assert!(matches!(result, Err(HoldingsError::NoCandidates(_))));
    }

    #[test]
    fn test_catalog_scan_fetch_failure_propagates() {
        let fund = FundSource::new(
            "f1",
            "https://example.com/missing/",
            LocatorKind::CatalogScan,
            ExtractorKind::LinePattern,
        );
        let result = CatalogScanLocator::new().locate(&fund, &FakeTransport::new(), &RunSettings::default());
        assert!(matches!(result, Err(HoldingsError::RemoteFetch { .. })));
    }

    #[test]
    fn test_format_template() {
        assert_eq!(
            format_template("https://x/{yyyy}/{mm}/r_{yyyymm}_{m}.pdf", 2024, 3),
            "https://x/2024/03/r_202403_3.pdf"
        );
    }

    #[test]
    fn test_months_before_wraps_year() {
        assert_eq!(months_before(date(2024, 2, 10), 1), (2024, 1));
        assert_eq!(months_before(date(2024, 2, 10), 2), (2023, 12));
        assert_eq!(months_before(date(2024, 1, 1), 3), (2023, 10));
    }

    #[test]
    fn test_probe_accepts_first_existing_month() {
        let fund = FundSource::new(
            "p1",
            "https://example.com/pdf/{yyyymm}.pdf",
            LocatorKind::PredictiveProbe,
            ExtractorKind::LinePattern,
        );
        // February missing, January present
        let transport = FakeTransport::new()
            .with_bytes("https://example.com/pdf/202401.pdf", b"%PDF")
            .with_bytes("https://example.com/pdf/202312.pdf", b"%PDF");

        let locator = PredictiveProbeLocator::new(date(2024, 3, 15));
        let found = locator.locate(&fund, &transport, &RunSettings::default()).unwrap();

        assert_eq!(found.url, "https://example.com/pdf/202401.pdf");
        assert_eq!(found.report_date, Some(date(2024, 1, 31)));
        assert_eq!(
            *transport.probed.borrow(),
            vec![
                "https://example.com/pdf/202402.pdf".to_string(),
                "https://example.com/pdf/202401.pdf".to_string(),
            ]
        );
    }

    #[test]
    fn test_probe_window_exhausted() {
        let fund = FundSource::new(
            "p1",
            "https://example.com/pdf/{yyyymm}.pdf",
            LocatorKind::PredictiveProbe,
            ExtractorKind::LinePattern,
        );
        // Present, but four months back - outside the window
        let transport = FakeTransport::new().with_bytes("https://example.com/pdf/202311.pdf", b"%PDF");

        let locator = PredictiveProbeLocator::new(date(2024, 3, 15));
        let result = locator.locate(&fund, &transport, &RunSettings::default());

        assert!(matches!(result, Err(HoldingsError::NoCandidates(_))));
        assert_eq!(transport.probed.borrow().len(), 3);
    }

    #[test]
    fn test_get_locator_kinds() {
        let today = date(2024, 3, 1);
        assert_eq!(get_locator(LocatorKind::CatalogScan, today).kind(), LocatorKind::CatalogScan);
        assert_eq!(
            get_locator(LocatorKind::PredictiveProbe, today).kind(),
            LocatorKind::PredictiveProbe
        );
    }
}
