//! Inter-event gap statistics
//!
//! Computes median, mean and population standard deviation of the minutes
//! elapsed between consecutive events of one entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// Gap statistics for a time-sorted timeline
///
/// All fields are `None` when the timeline has fewer than two events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapStatistics {
    /// Number of gaps (events - 1)
    pub gap_count: usize,
    pub mean_minutes: Option<f64>,
    pub median_minutes: Option<f64>,
    /// Population standard deviation (divides by the gap count)
    pub stddev_minutes: Option<f64>,
}

impl GapStatistics {
    /// Compute statistics from instants sorted ascending
    pub fn from_sorted(instants: &[DateTime<Utc>]) -> Self {
        let gaps: Vec<f64> = instants
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / MILLIS_PER_MINUTE)
            .collect();

        Self::from_gaps(&gaps)
    }

    /// Compute statistics from gap lengths in minutes
    pub fn from_gaps(gaps: &[f64]) -> Self {
        if gaps.is_empty() {
            return Self::default();
        }

        let mean = mean(gaps);
        let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / gaps.len() as f64;

        Self {
            gap_count: gaps.len(),
            mean_minutes: Some(mean),
            median_minutes: Some(median(gaps)),
            stddev_minutes: Some(variance.sqrt()),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Order-statistic median; averages the two central values for even counts
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
