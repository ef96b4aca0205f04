//! Feed SLA check
//!
//! A record meets its SLA when it was built no earlier than the latest arrival
//! among its entity's mapped feeds and no later than `sla_hours` after it.
//! Records whose timestamp failed to parse, and records of entities without
//! any feed arrival, never meet it.

use crate::feeds::FeedArrival;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// Latest feed arrival per entity, checked against record build times
#[derive(Debug, Clone)]
pub struct SlaChecker {
    window: Duration,
    last_feed: BTreeMap<String, DateTime<Utc>>,
}

impl SlaChecker {
    pub fn new(sla_hours: u32, arrivals: &[FeedArrival]) -> Self {
        let mut last_feed: BTreeMap<String, DateTime<Utc>> = BTreeMap::new();
        for arrival in arrivals {
            last_feed
                .entry(arrival.entity.clone())
                .and_modify(|latest| *latest = (*latest).max(arrival.received))
                .or_insert(arrival.received);
        }

        Self {
            window: Duration::hours(i64::from(sla_hours)),
            last_feed,
        }
    }

    /// Latest mapped feed arrival for an entity
    pub fn last_feed(&self, entity: &str) -> Option<DateTime<Utc>> {
        self.last_feed.get(entity).copied()
    }

    pub fn is_met(&self, entity: &str, built: Option<DateTime<Utc>>) -> bool {
        match (self.last_feed(entity), built) {
            (Some(feed), Some(built)) => built >= feed && built <= feed + self.window,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 21, hour, minute, 0).unwrap()
    }

    fn arrival(entity: &str, received: DateTime<Utc>) -> FeedArrival {
        FeedArrival {
            feed: format!("{}.csv", entity),
            entity: entity.to_string(),
            received,
        }
    }

    #[test]
    fn test_latest_arrival_per_entity() {
        let checker = SlaChecker::new(
            6,
            &[
                arrival("RPT_A", at(2, 0)),
                arrival("RPT_A", at(5, 0)),
                arrival("RPT_A", at(3, 0)),
            ],
        );

        assert_eq!(checker.last_feed("RPT_A"), Some(at(5, 0)));
        assert_eq!(checker.last_feed("RPT_B"), None);
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let checker = SlaChecker::new(6, &[arrival("RPT_A", at(5, 0))]);

        assert!(checker.is_met("RPT_A", Some(at(5, 0))));
        assert!(checker.is_met("RPT_A", Some(at(11, 0))));
        assert!(!checker.is_met("RPT_A", Some(at(11, 1))));
        // Built before the feed arrived
        assert!(!checker.is_met("RPT_A", Some(at(4, 59))));
    }

    #[test]
    fn test_missing_feed_or_build_time_is_not_met() {
        let checker = SlaChecker::new(6, &[arrival("RPT_A", at(5, 0))]);

        assert!(!checker.is_met("RPT_B", Some(at(6, 0))));
        assert!(!checker.is_met("RPT_A", None));
    }
}
