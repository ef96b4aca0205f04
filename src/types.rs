//! Core types for the Cadence Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw records, parse outcomes, normalized events, classifications and
//! the augmented output records.

use crate::gaps::GapStatistics;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Category emitted for records whose entity produced no successful parse
pub const UNCLASSIFIED: &str = "unclassified";

/// One input record, already filtered to the column allow-list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Record identifier
    pub id: String,
    /// Entity key used for grouping
    pub name: String,
    /// Raw timestamp text (absent when the source field is null)
    pub timestamp: Option<String>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, timestamp: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            timestamp: timestamp.map(str::to_string),
        }
    }
}

/// Display form for a canonical UTC instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalFormat {
    /// Full ISO-8601 with millisecond precision, e.g. `2025-03-21T02:07:06.434Z`
    Iso,
    /// Minute precision `DD-MM-YYYY-HH-mm`, e.g. `21-03-2025-02-07`
    #[default]
    Coarse,
}

impl CanonicalFormat {
    /// Render an instant in this display form
    pub fn render(&self, instant: &DateTime<Utc>) -> String {
        match self {
            CanonicalFormat::Iso => instant.to_rfc3339_opts(SecondsFormat::Millis, true),
            CanonicalFormat::Coarse => instant.format("%d-%m-%Y-%H-%M").to_string(),
        }
    }
}

/// Reason a timestamp could not be normalized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ParseFailure {
    #[error("empty input")]
    EmptyInput,

    #[error("unparsable format")]
    UnparsableFormat,
}

/// Successful normalization of a single timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTimestamp {
    /// Canonical instant (UTC)
    pub instant: DateTime<Utc>,
    /// Name of the strategy that matched
    pub strategy: &'static str,
}

impl ParsedTimestamp {
    /// Full ISO-8601 rendering
    pub fn canonical(&self) -> String {
        self.render(CanonicalFormat::Iso)
    }

    /// Render the instant in the requested display form
    pub fn render(&self, format: CanonicalFormat) -> String {
        format.render(&self.instant)
    }
}

/// Tagged result of normalizing one timestamp
pub type ParseOutcome = Result<ParsedTimestamp, ParseFailure>;

/// A successfully normalized event for one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedEvent {
    pub entity: String,
    pub instant: DateTime<Utc>,
    /// Timestamp text as it appeared in the record
    pub source_text: String,
}

impl NormalizedEvent {
    /// Event for a record whose timestamp normalized successfully
    pub fn from_outcome(record: &RawRecord, outcome: &ParseOutcome) -> Option<Self> {
        let parsed = outcome.as_ref().ok()?;
        Some(Self {
            entity: record.name.clone(),
            instant: parsed.instant,
            source_text: record.timestamp.clone().unwrap_or_default(),
        })
    }
}

/// Activity cadence detected over the trailing window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Daily,
    Weekly,
    Monthly,
    /// No streak qualified (serialized as `none`)
    #[serde(rename = "none")]
    NoCadence,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Daily => "daily",
            Category::Weekly => "weekly",
            Category::Monthly => "monthly",
            Category::NoCadence => "none",
        }
    }
}

/// Streak lengths found by the classifier (0 when no window qualified)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    pub daily: usize,
    pub weekly: usize,
    pub monthly: usize,
}

/// Per-entity classification result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub category: Category,
    pub streaks: StreakSummary,
    /// Number of events inside the trailing window
    pub events_in_window: usize,
    pub gaps: GapStatistics,
}

impl Classification {
    pub fn median_gap_minutes(&self) -> Option<f64> {
        self.gaps.median_minutes
    }

    pub fn stddev_gap_minutes(&self) -> Option<f64> {
        self.gaps.stddev_minutes
    }
}

/// Input record augmented with its normalized instant and entity classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub id: String,
    pub name: String,
    pub timestamp: String,
    /// Canonical instant, empty when the timestamp failed to parse
    pub utc: String,
    /// `daily|weekly|monthly|none|unclassified`
    pub category: String,
    pub median_minutes: Option<i64>,
    pub stddev_minutes: Option<i64>,
}

/// Result of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Run clock the trailing window was anchored to
    pub now: DateTime<Utc>,
    pub records: Vec<OutputRecord>,
    /// Raw text of every timestamp that failed to parse
    pub unmatched: Vec<String>,
    /// One `Failed to parse: <text> | Error: <reason>` line per failure
    pub error_log: Vec<String>,
    pub entities: BTreeMap<String, Classification>,
    /// Feed SLA outcome per record, when feed arrivals were supplied
    pub sla: Option<SlaReport>,
    /// Set when the record source failed before it was exhausted
    pub source_error: Option<String>,
}

impl RunReport {
    pub fn summary(&self) -> RunSummary {
        let mut by_category: BTreeMap<String, usize> = BTreeMap::new();
        for classification in self.entities.values() {
            *by_category
                .entry(classification.category.as_str().to_string())
                .or_insert(0) += 1;
        }

        RunSummary {
            flux_version: crate::FLUX_VERSION.to_string(),
            run_id: self.run_id,
            now: self.now,
            total_records: self.records.len(),
            parsed_records: self.records.iter().filter(|r| !r.utc.is_empty()).count(),
            failed_records: self.unmatched.len(),
            entities: self.entities.len(),
            by_category,
            sla_met: self.sla.as_ref().map(SlaReport::met_count),
            source_error: self.source_error.clone(),
        }
    }
}

/// Compact run statistics for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub flux_version: String,
    pub run_id: Uuid,
    pub now: DateTime<Utc>,
    pub total_records: usize,
    pub parsed_records: usize,
    pub failed_records: usize,
    pub entities: usize,
    pub by_category: BTreeMap<String, usize>,
    /// Records that met their feed SLA, when feed arrivals were supplied
    pub sla_met: Option<usize>,
    pub source_error: Option<String>,
}

/// SLA outcome for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaRecord {
    pub id: String,
    pub name: String,
    pub timestamp: String,
    /// Latest arrival among the entity's mapped feeds
    pub last_feed: Option<String>,
    pub sla_met: bool,
}

/// Per-record SLA outcomes of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlaReport {
    pub records: Vec<SlaRecord>,
    /// Entities with records but no mapped feed arrival
    pub entities_without_feeds: Vec<String>,
}

impl SlaReport {
    pub fn met_count(&self) -> usize {
        self.records.iter().filter(|r| r.sla_met).count()
    }
}
