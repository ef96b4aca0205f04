//! Per-entity timeline aggregation
//!
//! The aggregator collects successfully normalized instants in arrival order.
//! Timelines only become readable through [`ActivityAggregator::finish`], which
//! consumes the aggregator: classification can never observe a timeline that is
//! still being built.

use crate::types::NormalizedEvent;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Incrementally builds entity timelines during ingestion
#[derive(Debug, Default)]
pub struct ActivityAggregator {
    timelines: BTreeMap<String, Vec<DateTime<Utc>>>,
    events: usize,
}

impl ActivityAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a normalized event to its entity's timeline
    pub fn record_event(&mut self, event: &NormalizedEvent) {
        self.timelines
            .entry(event.entity.clone())
            .or_default()
            .push(event.instant);
        self.events += 1;
    }

    /// Number of events retained so far
    pub fn event_count(&self) -> usize {
        self.events
    }

    /// Close ingestion and expose the complete timelines
    pub fn finish(self) -> CompletedTimelines {
        CompletedTimelines {
            timelines: self.timelines,
        }
    }
}

/// Read-only timelines, available once ingestion has completed
#[derive(Debug, Clone, Default)]
pub struct CompletedTimelines {
    timelines: BTreeMap<String, Vec<DateTime<Utc>>>,
}

impl CompletedTimelines {
    /// Instants for an entity in arrival order
    pub fn timeline(&self, entity: &str) -> Option<&[DateTime<Utc>]> {
        self.timelines.get(entity).map(Vec::as_slice)
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.timelines.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DateTime<Utc>])> {
        self.timelines
            .iter()
            .map(|(entity, instants)| (entity.as_str(), instants.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.timelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(entity: &str, hour: u32) -> NormalizedEvent {
        NormalizedEvent {
            entity: entity.to_string(),
            instant: Utc.with_ymd_and_hms(2024, 1, 15, hour, 0, 0).unwrap(),
            source_text: format!("2024-01-15 {:02}:00", hour),
        }
    }

    #[test]
    fn test_keeps_arrival_order_and_duplicates() {
        let mut aggregator = ActivityAggregator::new();
        aggregator.record_event(&event("feed_a", 12));
        aggregator.record_event(&event("feed_a", 9));
        aggregator.record_event(&event("feed_a", 12));

        let timelines = aggregator.finish();
        let hours: Vec<u32> = timelines
            .timeline("feed_a")
            .unwrap()
            .iter()
            .map(|t| t.format("%H").to_string().parse().unwrap())
            .collect();

        assert_eq!(hours, vec![12, 9, 12]);
    }

    #[test]
    fn test_timelines_per_entity() {
        let mut aggregator = ActivityAggregator::new();
        aggregator.record_event(&event("feed_b", 8));
        aggregator.record_event(&event("feed_a", 7));
        aggregator.record_event(&event("feed_b", 9));

        assert_eq!(aggregator.event_count(), 3);

        let timelines = aggregator.finish();
        assert_eq!(timelines.len(), 2);
        assert!(!timelines.is_empty());
        assert!(timelines.timeline("feed_c").is_none());
        assert_eq!(timelines.timeline("feed_b").unwrap().len(), 2);
        assert_eq!(timelines.entities().collect::<Vec<_>>(), vec!["feed_a", "feed_b"]);
    }

    #[test]
    fn test_empty_aggregator() {
        let timelines = ActivityAggregator::new().finish();

        assert!(timelines.is_empty());
        assert_eq!(timelines.iter().count(), 0);
    }
}
