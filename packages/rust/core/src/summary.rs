//! Run summary reported at the end of an ingestion run.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pricescrape_catalog::ExcludedRow;
use pricescrape_shared::{Condition, PriceScrapeError, Result};
use serde::Serialize;
use uuid::Uuid;

/// An item whose pages could not be fetched; none of its sales were kept.
#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub game_id: u32,
    pub url: String,
    pub error: String,
}

/// One condition of an otherwise fetched item whose sales could not be paired.
#[derive(Debug, Clone, Serialize)]
pub struct ConditionFailure {
    pub game_id: u32,
    pub condition: Condition,
    pub error: String,
}

/// Sale rows written per condition table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub loose: usize,
    pub complete: usize,
    pub new: usize,
}

impl RecordCounts {
    pub fn get(&self, condition: Condition) -> usize {
        match condition {
            Condition::Loose => self.loose,
            Condition::Complete => self.complete,
            Condition::New => self.new,
        }
    }

    pub(crate) fn add(&mut self, condition: Condition, count: usize) {
        match condition {
            Condition::Loose => self.loose += count,
            Condition::Complete => self.complete += count,
            Condition::New => self.new += count,
        }
    }

    pub fn total(&self) -> usize {
        self.loose + self.complete + self.new
    }
}

/// Outcome of one `ingest` run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    /// Whether existing tables were kept instead of rebuilt.
    pub resumed: bool,
    /// Catalog rows seen, including excluded ones.
    pub rows_read: usize,
    pub excluded: Vec<ExcludedRow>,
    /// Rows in `avg_game_prices`.
    pub items_loaded: usize,
    pub consoles: usize,
    pub items_attempted: usize,
    pub items_succeeded: usize,
    pub failures: Vec<ItemFailure>,
    /// Conditions that degraded to the placeholder because the page layout was unexpected.
    pub parse_fallbacks: usize,
    pub condition_failures: Vec<ConditionFailure>,
    pub records: RecordCounts,
    /// Consoles whose history was committed, in processing order.
    pub consoles_completed: Vec<String>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl RunSummary {
    pub(crate) fn new() -> Self {
        Self {
            run_id: Uuid::now_v7(),
            started_at: Utc::now(),
            resumed: false,
            rows_read: 0,
            excluded: Vec::new(),
            items_loaded: 0,
            consoles: 0,
            items_attempted: 0,
            items_succeeded: 0,
            failures: Vec::new(),
            parse_fallbacks: 0,
            condition_failures: Vec::new(),
            records: RecordCounts::default(),
            consoles_completed: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn items_failed(&self) -> usize {
        self.failures.len()
    }

    /// Write the summary as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).map_err(|e| PriceScrapeError::io(path, e.into()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PriceScrapeError::io(parent, e))?;
        }
        std::fs::write(path, json).map_err(|e| PriceScrapeError::io(path, e))
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
