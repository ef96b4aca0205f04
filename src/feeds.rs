//! Feed arrivals and their mapping onto entities
//!
//! A mapping table pairs a feed file-name pattern with the entity that consumes
//! the feed. Patterns are regular expressions anchored at the start of the feed
//! name; the first mapping that matches wins. Arrivals whose feed has no
//! mapping, or whose timestamp does not normalize, are dropped.

use crate::config::FeedColumns;
use crate::error::CadenceError;
use crate::normalizer::TimestampNormalizer;
use crate::schema::column_position;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::io::Read;
use tracing::{debug, info};

/// One pattern-to-entity row of the mapping table
#[derive(Debug, Clone)]
pub struct FeedMapping {
    pattern: Regex,
    entity: String,
}

impl FeedMapping {
    pub fn new(pattern: &str, entity: impl Into<String>) -> Result<Self, CadenceError> {
        let anchored = Regex::new(&format!("^(?:{})", pattern)).map_err(|source| {
            CadenceError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        Ok(Self {
            pattern: anchored,
            entity: entity.into(),
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn matches(&self, feed: &str) -> bool {
        self.pattern.is_match(feed)
    }
}

/// A feed arrival attributed to an entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedArrival {
    pub feed: String,
    pub entity: String,
    pub received: DateTime<Utc>,
}

/// Arrivals kept after matching, with counts of what was dropped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchedFeeds {
    pub arrivals: Vec<FeedArrival>,
    /// Rows whose feed name matched no mapping
    pub unmapped: usize,
    /// Rows whose arrival timestamp failed to normalize
    pub unparsed: usize,
}

/// Ordered feed mapping table
#[derive(Debug, Clone, Default)]
pub struct FeedMatcher {
    mappings: Vec<FeedMapping>,
}

impl FeedMatcher {
    pub fn new(mappings: Vec<FeedMapping>) -> Self {
        Self { mappings }
    }

    /// Load the mapping table from CSV
    pub fn from_csv<R: Read>(reader: R, columns: &FeedColumns) -> Result<Self, CadenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let pattern_idx = column_position(&headers, &columns.pattern)?;
        let entity_idx = column_position(&headers, &columns.entity)?;

        let mut mappings = Vec::new();
        for row in reader.records() {
            let row = row?;
            let pattern = row.get(pattern_idx).unwrap_or_default();
            let entity = row.get(entity_idx).unwrap_or_default();
            if pattern.is_empty() || entity.is_empty() {
                continue;
            }
            mappings.push(FeedMapping::new(pattern, entity)?);
        }

        debug!(mappings = mappings.len(), "feed mapping loaded");
        Ok(Self::new(mappings))
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Entity of the first mapping whose pattern matches the feed name
    pub fn match_feed(&self, feed: &str) -> Option<&str> {
        self.mappings
            .iter()
            .find(|mapping| mapping.matches(feed))
            .map(FeedMapping::entity)
    }

    /// Read a CSV table of feed arrivals and attribute each one to an entity
    pub fn match_arrivals<R: Read>(
        &self,
        reader: R,
        columns: &FeedColumns,
        normalizer: &TimestampNormalizer,
    ) -> Result<MatchedFeeds, CadenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        let feed_idx = column_position(&headers, &columns.feed)?;
        let received_idx = column_position(&headers, &columns.received)?;

        let mut matched = MatchedFeeds::default();
        for row in reader.records() {
            let row = row?;
            let feed = row.get(feed_idx).unwrap_or_default();

            let Some(entity) = self.match_feed(feed) else {
                debug!(feed, "feed matches no mapping");
                matched.unmapped += 1;
                continue;
            };

            match normalizer.normalize(row.get(received_idx)) {
                Ok(parsed) => matched.arrivals.push(FeedArrival {
                    feed: feed.to_string(),
                    entity: entity.to_string(),
                    received: parsed.instant,
                }),
                Err(failure) => {
                    debug!(feed, reason = %failure, "feed arrival timestamp failed to parse");
                    matched.unparsed += 1;
                }
            }
        }

        info!(
            arrivals = matched.arrivals.len(),
            unmapped = matched.unmapped,
            unparsed = matched.unparsed,
            "feed arrivals matched"
        );
        Ok(matched)
    }
}
