//! Activity cadence classification
//!
//! Detects daily, weekly and monthly streaks in an entity's timeline over a
//! trailing window anchored at the run clock.
//!
//! Events are bucketed by ISO week and by calendar month. A streak window is a
//! run of consecutive buckets (each the calendar successor of the previous one)
//! that all satisfy the activity threshold:
//! - daily: every week covers at least `min_weekdays_per_week` distinct Mon-Fri days
//! - weekly: every week has at least one event
//! - monthly: every month has at least one event
//!
//! The first qualifying window settles the streak at the window length; no
//! search for a longer run is made.

use crate::config::CadenceConfig;
use crate::gaps::GapStatistics;
use crate::types::{Category, Classification, StreakSummary};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc, Weekday};
use std::collections::{BTreeMap, BTreeSet};

/// ISO week-year and week number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WeekKey {
    pub year: i32,
    pub week: u32,
}

impl WeekKey {
    pub fn of(instant: &DateTime<Utc>) -> Self {
        let iso = instant.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// The ISO week that follows this one
    pub fn next(&self) -> Option<Self> {
        let monday = NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)?;
        let iso = (monday + Duration::days(7)).iso_week();
        Some(Self {
            year: iso.year(),
            week: iso.week(),
        })
    }
}

/// Calendar year and month
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn of(instant: &DateTime<Utc>) -> Self {
        Self {
            year: instant.year(),
            month: instant.month(),
        }
    }

    pub fn next(&self) -> Option<Self> {
        Some(if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        })
    }
}

#[derive(Debug, Default)]
struct WeekBucket {
    events: usize,
    /// ISO weekday numbers (Monday = 1) seen in the week
    weekdays: BTreeSet<u32>,
}

impl WeekBucket {
    fn working_days(&self) -> usize {
        self.weekdays.range(1..=5).count()
    }
}

/// Timeline bucketed by week and by month
#[derive(Debug, Default)]
struct Buckets {
    by_week: BTreeMap<WeekKey, WeekBucket>,
    by_month: BTreeMap<MonthKey, usize>,
}

impl Buckets {
    fn from_instants(instants: &[DateTime<Utc>]) -> Self {
        let mut buckets = Self::default();
        for instant in instants {
            let week = buckets.by_week.entry(WeekKey::of(instant)).or_default();
            week.events += 1;
            week.weekdays.insert(instant.weekday().number_from_monday());

            *buckets.by_month.entry(MonthKey::of(instant)).or_insert(0) += 1;
        }
        buckets
    }
}

/// Classifies entity timelines against a fixed run clock
#[derive(Debug, Clone)]
pub struct StreakClassifier {
    config: CadenceConfig,
    now: DateTime<Utc>,
}

impl StreakClassifier {
    pub fn new(config: CadenceConfig, now: DateTime<Utc>) -> Self {
        Self { config, now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Earliest instant inside the trailing window
    pub fn window_start(&self) -> DateTime<Utc> {
        self.now
            .checked_sub_months(Months::new(self.config.trailing_months))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Classify one entity's timeline (any order)
    pub fn classify(&self, timeline: &[DateTime<Utc>]) -> Classification {
        let start = self.window_start();
        let mut in_window: Vec<DateTime<Utc>> =
            timeline.iter().copied().filter(|t| *t >= start).collect();
        in_window.sort();

        let buckets = Buckets::from_instants(&in_window);
        let streaks = self.detect_streaks(&buckets);

        Classification {
            category: self.categorize(&streaks),
            streaks,
            events_in_window: in_window.len(),
            gaps: GapStatistics::from_sorted(&in_window),
        }
    }

    fn detect_streaks(&self, buckets: &Buckets) -> StreakSummary {
        let weeks: Vec<WeekKey> = buckets.by_week.keys().copied().collect();
        let months: Vec<MonthKey> = buckets.by_month.keys().copied().collect();
        let week_len = self.config.streak_weeks;
        let month_len = self.config.streak_months;

        let daily = has_streak(&weeks, week_len, WeekKey::next, |key| {
            buckets
                .by_week
                .get(key)
                .is_some_and(|b| b.working_days() >= self.config.min_weekdays_per_week)
        });
        let weekly = has_streak(&weeks, week_len, WeekKey::next, |key| {
            buckets.by_week.get(key).is_some_and(|b| b.events >= 1)
        });
        let monthly = has_streak(&months, month_len, MonthKey::next, |key| {
            buckets.by_month.get(key).is_some_and(|count| *count >= 1)
        });

        StreakSummary {
            daily: if daily { week_len } else { 0 },
            weekly: if weekly { week_len } else { 0 },
            monthly: if monthly { month_len } else { 0 },
        }
    }

    fn categorize(&self, streaks: &StreakSummary) -> Category {
        if streaks.daily >= self.config.streak_weeks {
            Category::Daily
        } else if streaks.weekly >= self.config.streak_weeks {
            Category::Weekly
        } else if streaks.monthly >= self.config.streak_months {
            Category::Monthly
        } else {
            Category::NoCadence
        }
    }
}

/// Slide a `len`-key window over sorted keys; true on the first window whose
/// keys are calendar-consecutive and all valid
fn has_streak<K, N, V>(keys: &[K], len: usize, next: N, valid: V) -> bool
where
    K: Copy + PartialEq,
    N: Fn(&K) -> Option<K>,
    V: Fn(&K) -> bool,
{
    if len == 0 || keys.len() < len {
        return false;
    }

    keys.windows(len).any(|window| {
        window.iter().all(&valid)
            && window
                .windows(2)
                .all(|pair| next(&pair[0]) == Some(pair[1]))
    })
}
