// 📤 Report - flat holding records plus per-fund outcomes for one run

use crate::error::Result;
use crate::resolver::MatchStatus;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use tracing::info;

/// HoldingRecord - one output row (fund order, then extraction order)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingRecord {
    pub fund_id: String,
    pub report_date: Option<NaiveDate>,
    pub rank: Option<u8>,
    pub holding_name: String,
    pub code: Option<String>,
    pub status: MatchStatus,
    pub artifact_url: String,
}

/// Pipeline stage a fund failed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Locate,
    Fetch,
    Render,
    Extract,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Locate => "locate",
            Stage::Fetch => "fetch",
            Stage::Render => "render",
            Stage::Extract => "extract",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FundStatus {
    Completed { holdings: usize },

    /// Extractor recognized nothing; not an error
    Empty,

    Failed { stage: Stage, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundOutcome {
    pub fund_id: String,
    #[serde(flatten)]
    pub status: FundStatus,
}

/// RunReport - everything one run produced
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub records: Vec<HoldingRecord>,
    pub outcomes: Vec<FundOutcome>,
}

impl RunReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_outcome(&mut self, fund_id: &str, status: FundStatus) {
        self.outcomes.push(FundOutcome {
            fund_id: fund_id.to_string(),
            status,
        });
    }

    pub fn completed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FundStatus::Completed { .. }))
            .count()
    }

    pub fn empty(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == FundStatus::Empty)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, FundStatus::Failed { .. }))
            .count()
    }

    /// Records per match status, keyed by status code
    pub fn status_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.status.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn log_summary(&self) {
        info!(
            funds = self.outcomes.len(),
            completed = self.completed(),
            empty = self.empty(),
            failed = self.failed(),
            records = self.records.len(),
            statuses = ?self.status_counts(),
            "run finished"
        );
    }

    /// Records as CSV with a header row; nulls become empty cells
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in &self.records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Records as a pretty-printed JSON array
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, &self.records)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
