// 🚦 Driver - locate → fetch → render → extract → resolve, one fund at a time
//
// Every fund-scoped failure stops at the fund boundary: it is logged with
// fund id + stage + cause, recorded as an outcome, and the loop moves on.

use crate::config::{FundCatalog, FundSource};
use crate::document::{ArtifactContent, DocumentForm, DocumentRenderer, ReportArtifact, ReportDocument};
use crate::error::HoldingsError;
use crate::extractors::ExtractorRegistry;
use crate::locator::get_locator;
use crate::report::{FundStatus, HoldingRecord, RunReport, Stage};
use crate::resolver::{Registry, ResolutionResult};
use crate::transport::Transport;
use chrono::{Local, NaiveDate};
use tracing::{debug, error, info, warn};

/// A fund-scoped error tagged with the stage that raised it
#[derive(Debug)]
struct StageError {
    stage: Stage,
    source: HoldingsError,
}

fn at(stage: Stage) -> impl FnOnce(HoldingsError) -> StageError {
    move |source| StageError { stage, source }
}

pub struct Driver<'a> {
    catalog: &'a FundCatalog,
    registry: &'a Registry,
    transport: &'a dyn Transport,
    renderer: &'a dyn DocumentRenderer,
    extractors: ExtractorRegistry,
    reference_date: NaiveDate,
}

impl<'a> Driver<'a> {
    pub fn new(
        catalog: &'a FundCatalog,
        registry: &'a Registry,
        transport: &'a dyn Transport,
        renderer: &'a dyn DocumentRenderer,
    ) -> Self {
        Driver {
            catalog,
            registry,
            transport,
            renderer,
            extractors: ExtractorRegistry::with_defaults(),
            reference_date: Local::now().date_naive(),
        }
    }

    /// Anchor for predictive-probe windows (defaults to today)
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = date;
        self
    }

    pub fn with_extractors(mut self, extractors: ExtractorRegistry) -> Self {
        self.extractors = extractors;
        self
    }

    /// Process every fund in catalog order. Never fails as a whole.
    pub fn run(&self) -> RunReport {
        let mut report = RunReport::new();

        for fund in self.catalog.funds() {
            info!(
                fund_id = %fund.id,
                fund_name = fund.name.as_deref().unwrap_or(""),
                locator = fund.locator.name(),
                extractor = fund.extractor.name(),
                "processing fund"
            );

            match self.process_fund(fund) {
                Ok(records) if records.is_empty() => {
                    warn!(fund_id = %fund.id, "no holdings extracted, fund skipped");
                    report.push_outcome(&fund.id, FundStatus::Empty);
                }
                Ok(records) => {
                    info!(fund_id = %fund.id, holdings = records.len(), "fund completed");
                    report.push_outcome(&fund.id, FundStatus::Completed { holdings: records.len() });
                    report.records.extend(records);
                }
                Err(failure) => {
                    error!(
                        fund_id = %fund.id,
                        stage = %failure.stage,
                        error = %failure.source,
                        "fund failed"
                    );
                    report.push_outcome(
                        &fund.id,
                        FundStatus::Failed {
                            stage: failure.stage,
                            message: failure.source.to_string(),
                        },
                    );
                }
            }
        }

        report.log_summary();
        report
    }

    fn process_fund(&self, fund: &FundSource) -> Result<Vec<HoldingRecord>, StageError> {
        let settings = self.catalog.settings();

        // 1. Locate
        let locator = get_locator(fund.locator, self.reference_date);
        let located = locator
            .locate(fund, self.transport, settings)
            .map_err(at(Stage::Locate))?;

        let extractor = self.extractors.get(fund.extractor).ok_or_else(|| StageError {
            stage: Stage::Extract,
            source: HoldingsError::Configuration(format!(
                "no extractor registered for {}",
                fund.extractor.name()
            )),
        })?;

        // 2. Fetch - markup as text, everything else as bytes
        let form = extractor.form();
        let content = match form {
            DocumentForm::Markup => self
                .transport
                .fetch_text(&located.url, settings.download_timeout())
                .map(ArtifactContent::Text),
            DocumentForm::Pages => self
                .transport
                .fetch_bytes(&located.url, settings.download_timeout())
                .map(ArtifactContent::Bytes),
        }
        .map_err(at(Stage::Fetch))?;

        let artifact = ReportArtifact {
            url: located.url,
            report_date: located.report_date,
            content,
        };

        // 3. Render / parse
        let document =
            ReportDocument::prepare(&artifact, form, self.renderer).map_err(at(Stage::Render))?;

        // 4. Extract
        let candidates = extractor
            .extract(&document, &fund.extraction_config())
            .map_err(at(Stage::Extract))?;

        // 5. Resolve (skipped when the document printed the code)
        let records = candidates
            .into_iter()
            .map(|candidate| {
                let resolution = match &candidate.source_code {
                    Some(code) => ResolutionResult::from_document(code),
                    None => self.registry.resolve(&candidate.display_name),
                };
                debug!(
                    fund_id = %fund.id,
                    rank = ?candidate.rank,
                    name = %candidate.display_name,
                    code = ?resolution.code,
                    status = resolution.status.as_str(),
                    "holding resolved"
                );

                HoldingRecord {
                    fund_id: fund.id.clone(),
                    report_date: artifact.report_date,
                    rank: candidate.rank,
                    holding_name: candidate.display_name,
                    code: resolution.code,
                    status: resolution.status,
                    artifact_url: artifact.url.clone(),
                }
            })
            .collect();

        Ok(records)
    }
}

// ============================================================================
// TESTS
// ============================================================================
