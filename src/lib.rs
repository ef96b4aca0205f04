//! Cadence Flux - Timestamp normalization and activity-cadence classification
//!
//! Flux turns batch records carrying freeform timestamp text into canonical UTC
//! instants and classifies how regularly each entity is active through a
//! deterministic two-phase pipeline: record source → normalization →
//! aggregation → (ingestion complete) → streak classification + gap
//! statistics → annotated output.
//!
//! ## Modules
//!
//! - **Normalizer**: ordered parse strategies from raw text to UTC instants
//! - **Aggregator / Classifier / Gaps**: per-entity timelines, cadence and interval statistics
//! - **Schema / Encoder**: record sources and output formats around the core
//! - **Feeds / SLA**: feed-to-entity mapping and the build-after-feed SLA check

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod feeds;
pub mod gaps;
pub mod normalizer;
pub mod pipeline;
pub mod schema;
pub mod sla;
pub mod types;

pub use aggregator::{ActivityAggregator, CompletedTimelines};
pub use classifier::StreakClassifier;
pub use config::{CadenceConfig, ColumnMapping, FeedColumns};
pub use encoder::{RecordFormat, ReportEncoder};
pub use error::CadenceError;
pub use feeds::{FeedArrival, FeedMapping, FeedMatcher, MatchedFeeds};
pub use gaps::GapStatistics;
pub use normalizer::{ParseStrategy, TimestampNormalizer};
pub use pipeline::{classify_records, CadenceProcessor};
pub use schema::RecordAdapter;
pub use sla::SlaChecker;
pub use types::{
    CanonicalFormat, Category, Classification, OutputRecord, ParseFailure, ParseOutcome,
    ParsedTimestamp, RawRecord, RunReport, SlaRecord, SlaReport,
};

/// Flux version embedded in run summaries
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "cadence-flux";
