//! Run configuration
//!
//! Cadence thresholds, the input column allow-list and the feed SLA settings.
//! Every field has a default, so a config file only needs to name what it
//! overrides.

use crate::error::CadenceError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default trailing window in calendar months
pub const DEFAULT_TRAILING_MONTHS: u32 = 6;

/// Default week-window length for daily and weekly streaks
pub const DEFAULT_STREAK_WEEKS: usize = 7;

/// Default distinct Monday-Friday weekdays required for a daily week
pub const DEFAULT_MIN_WEEKDAYS: usize = 5;

/// Default month-window length for the monthly streak
pub const DEFAULT_STREAK_MONTHS: usize = 3;

/// Default hours after the last mapped feed arrival within which a record
/// must be built to meet its SLA
pub const DEFAULT_SLA_HOURS: u32 = 6;

/// Header names retained from input records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub id: String,
    pub name: String,
    pub timestamp: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            name: "name".to_string(),
            timestamp: "timestamp".to_string(),
        }
    }
}

/// Header names of the feed arrival and feed mapping tables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedColumns {
    /// Feed file name in the arrivals table
    pub feed: String,
    /// Arrival timestamp in the arrivals table
    pub received: String,
    /// Regex column in the mapping table
    pub pattern: String,
    /// Entity name column in the mapping table
    pub entity: String,
}

impl Default for FeedColumns {
    fn default() -> Self {
        Self {
            feed: "feed_file_name".to_string(),
            received: "feed_received_timestamp".to_string(),
            pattern: "feed_pattern".to_string(),
            entity: "rec_name".to_string(),
        }
    }
}

/// Streak thresholds and trailing window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceConfig {
    pub trailing_months: u32,
    pub streak_weeks: usize,
    pub min_weekdays_per_week: usize,
    pub streak_months: usize,
    pub columns: ColumnMapping,
    pub sla_hours: u32,
    pub feed_columns: FeedColumns,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            trailing_months: DEFAULT_TRAILING_MONTHS,
            streak_weeks: DEFAULT_STREAK_WEEKS,
            min_weekdays_per_week: DEFAULT_MIN_WEEKDAYS,
            streak_months: DEFAULT_STREAK_MONTHS,
            columns: ColumnMapping::default(),
            sla_hours: DEFAULT_SLA_HOURS,
            feed_columns: FeedColumns::default(),
        }
    }
}

impl CadenceConfig {
    /// Load and validate a config from JSON
    pub fn from_json(json: &str) -> Result<Self, CadenceError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self, CadenceError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn validate(&self) -> Result<(), CadenceError> {
        if self.trailing_months == 0 {
            return Err(CadenceError::InvalidConfig(
                "trailing_months must be at least 1".to_string(),
            ));
        }
        if self.streak_weeks == 0 || self.streak_months == 0 {
            return Err(CadenceError::InvalidConfig(
                "streak window lengths must be at least 1".to_string(),
            ));
        }
        if !(1..=5).contains(&self.min_weekdays_per_week) {
            return Err(CadenceError::InvalidConfig(format!(
                "min_weekdays_per_week must be between 1 and 5, got {}",
                self.min_weekdays_per_week
            )));
        }
        if self.sla_hours == 0 {
            return Err(CadenceError::InvalidConfig(
                "sla_hours must be at least 1".to_string(),
            ));
        }
        let columns = [
            &self.columns.id,
            &self.columns.name,
            &self.columns.timestamp,
            &self.feed_columns.feed,
            &self.feed_columns.received,
            &self.feed_columns.pattern,
            &self.feed_columns.entity,
        ];
        if columns.iter().any(|c| c.trim().is_empty()) {
            return Err(CadenceError::InvalidConfig(
                "column names must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
