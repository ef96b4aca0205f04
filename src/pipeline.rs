//! Pipeline orchestration
//!
//! This module provides the public API for Cadence Flux. A run has two phases:
//!
//! 1. Ingest: every record is normalized as it arrives, successes are appended
//!    to the entity timelines and each record is staged with its display form.
//! 2. Classify: once the source is exhausted the aggregator is closed, every
//!    entity is classified from its complete timeline, and the staged records
//!    are annotated with their entity's classification.
//!
//! If the record source fails mid-stream, ingestion stops at the failure and
//! the run is finalized for the records already ingested. The failure is kept
//! in [`RunReport::source_error`].
//!
//! With an [`SlaChecker`] attached, the classify phase also checks every staged
//! record against its entity's latest feed arrival.

use crate::aggregator::{ActivityAggregator, CompletedTimelines};
use crate::classifier::StreakClassifier;
use crate::config::CadenceConfig;
use crate::encoder::error_log_line;
use crate::error::CadenceError;
use crate::normalizer::TimestampNormalizer;
use crate::sla::SlaChecker;
use crate::types::{
    CanonicalFormat, Classification, NormalizedEvent, OutputRecord, RawRecord, RunReport,
    SlaRecord, SlaReport, UNCLASSIFIED,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Classify a closed set of records in one call.
///
/// # Arguments
/// * `records` - Records already filtered to the column allow-list
/// * `config` - Streak thresholds and trailing window
/// * `now` - Run clock the trailing window is anchored to
///
/// # Example
/// ```ignore
/// let report = classify_records(records, CadenceConfig::default(), Utc::now());
/// for record in &report.records {
///     println!("{} {}", record.name, record.category);
/// }
/// ```
pub fn classify_records(
    records: Vec<RawRecord>,
    config: CadenceConfig,
    now: DateTime<Utc>,
) -> RunReport {
    CadenceProcessor::new(config, now).process(records.into_iter().map(Ok))
}

/// Record staged during ingestion, waiting for its entity classification
struct StagedRecord {
    record: RawRecord,
    utc: String,
    event: Option<NormalizedEvent>,
}

/// Everything gathered by the ingest phase
struct Ingested {
    aggregator: ActivityAggregator,
    staged: Vec<StagedRecord>,
    unmatched: Vec<String>,
    error_log: Vec<String>,
    source_error: Option<String>,
}

/// Two-phase batch processor
pub struct CadenceProcessor {
    normalizer: TimestampNormalizer,
    classifier: StreakClassifier,
    utc_format: CanonicalFormat,
    sla: Option<SlaChecker>,
}

impl CadenceProcessor {
    /// Create a processor using the dotted-meridiem-aware normalizer and the
    /// coarse `DD-MM-YYYY-HH-mm` display form
    pub fn new(config: CadenceConfig, now: DateTime<Utc>) -> Self {
        Self {
            normalizer: TimestampNormalizer::with_dotted_meridiem(),
            classifier: StreakClassifier::new(config, now),
            utc_format: CanonicalFormat::Coarse,
            sla: None,
        }
    }

    /// Set the display form of the `utc` output column
    pub fn with_utc_format(mut self, format: CanonicalFormat) -> Self {
        self.utc_format = format;
        self
    }

    /// Check every record against its entity's latest feed arrival
    pub fn with_sla(mut self, checker: SlaChecker) -> Self {
        self.sla = Some(checker);
        self
    }

    pub fn classifier(&self) -> &StreakClassifier {
        &self.classifier
    }

    /// Run both phases over a record source
    pub fn process<I>(&self, records: I) -> RunReport
    where
        I: IntoIterator<Item = Result<RawRecord, CadenceError>>,
    {
        let ingested = self.ingest(records);

        // Ingestion is complete: timelines become readable only from here
        let timelines = ingested.aggregator.finish();
        let entities = self.classify_all(&timelines);

        let sla = self
            .sla
            .as_ref()
            .map(|checker| self.check_sla(checker, &ingested.staged));

        let records: Vec<OutputRecord> = ingested
            .staged
            .into_iter()
            .map(|staged| annotate(staged, &entities))
            .collect();

        let report = RunReport {
            run_id: Uuid::new_v4(),
            now: self.classifier.now(),
            records,
            unmatched: ingested.unmatched,
            error_log: ingested.error_log,
            entities,
            sla,
            source_error: ingested.source_error,
        };

        let summary = report.summary();
        info!(
            run_id = %summary.run_id,
            records = summary.total_records,
            parsed = summary.parsed_records,
            failed = summary.failed_records,
            entities = summary.entities,
            truncated = summary.source_error.is_some(),
            "cadence run complete"
        );

        report
    }

    fn ingest<I>(&self, records: I) -> Ingested
    where
        I: IntoIterator<Item = Result<RawRecord, CadenceError>>,
    {
        let mut ingested = Ingested {
            aggregator: ActivityAggregator::new(),
            staged: Vec::new(),
            unmatched: Vec::new(),
            error_log: Vec::new(),
            source_error: None,
        };

        for item in records {
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        error = %e,
                        ingested = ingested.staged.len(),
                        "record source failed; finalizing records ingested so far"
                    );
                    ingested.source_error = Some(e.to_string());
                    break;
                }
            };

            let outcome = self.normalizer.normalize(record.timestamp.as_deref());
            let utc = match &outcome {
                Ok(parsed) => parsed.render(self.utc_format),
                Err(failure) => {
                    let text = record.timestamp.clone().unwrap_or_default();
                    debug!(id = %record.id, entity = %record.name, text = %text, reason = %failure, "timestamp parse failed");
                    ingested.error_log.push(error_log_line(&text, *failure));
                    ingested.unmatched.push(text);
                    String::new()
                }
            };

            let event = NormalizedEvent::from_outcome(&record, &outcome);
            if let Some(event) = &event {
                ingested.aggregator.record_event(event);
            }
            ingested.staged.push(StagedRecord { record, utc, event });
        }

        ingested
    }

    fn classify_all(&self, timelines: &CompletedTimelines) -> BTreeMap<String, Classification> {
        timelines
            .iter()
            .map(|(entity, timeline)| {
                let classification = self.classifier.classify(timeline);
                debug!(
                    entity,
                    category = classification.category.as_str(),
                    events = timeline.len(),
                    in_window = classification.events_in_window,
                    "entity classified"
                );
                (entity.to_string(), classification)
            })
            .collect()
    }

    fn check_sla(&self, checker: &SlaChecker, staged: &[StagedRecord]) -> SlaReport {
        let mut without_feeds = BTreeSet::new();

        let records = staged
            .iter()
            .map(|staged| {
                let name = &staged.record.name;
                let last_feed = checker.last_feed(name);
                if last_feed.is_none() {
                    without_feeds.insert(name.clone());
                }

                SlaRecord {
                    id: staged.record.id.clone(),
                    name: name.clone(),
                    timestamp: staged.record.timestamp.clone().unwrap_or_default(),
                    last_feed: last_feed.map(|t| self.utc_format.render(&t)),
                    sla_met: checker.is_met(name, staged.event.as_ref().map(|e| e.instant)),
                }
            })
            .collect();

        for entity in &without_feeds {
            warn!(entity = %entity, "entity has no related feed arrivals");
        }

        SlaReport {
            records,
            entities_without_feeds: without_feeds.into_iter().collect(),
        }
    }
}

fn annotate(staged: StagedRecord, entities: &BTreeMap<String, Classification>) -> OutputRecord {
    let StagedRecord { record, utc, .. } = staged;
    let classification = entities.get(&record.name);

    OutputRecord {
        id: record.id,
        timestamp: record.timestamp.unwrap_or_default(),
        utc,
        category: classification
            .map(|c| c.category.as_str())
            .unwrap_or(UNCLASSIFIED)
            .to_string(),
        median_minutes: classification
            .and_then(Classification::median_gap_minutes)
            .map(round_minutes),
        stddev_minutes: classification
            .and_then(Classification::stddev_gap_minutes)
            .map(round_minutes),
        name: record.name,
    }
}

fn round_minutes(minutes: f64) -> i64 {
    minutes.round() as i64
}
