//! Rolling window of dates eligible for snapshot-backed serving.
//!
//! The window runs from the first day of the previous calendar month to
//! today. Snapshots only hold rows inside it, so a request starting before
//! the window must go to the relation store.

use chrono::{Datelike, NaiveDate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheWindow {
    pub start: NaiveDate,
    pub today: NaiveDate,
}

impl CacheWindow {
    pub fn as_of(today: NaiveDate) -> Self {
        Self {
            start: cache_window_start(today),
            today,
        }
    }

    /// Whether a request starting at `date_from` can be served from snapshots.
    pub fn contains(&self, date_from: NaiveDate) -> bool {
        date_from >= self.start
    }
}

/// First day of the calendar month preceding `today`.
pub fn cache_window_start(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 1 {
        (today.year() - 1, 12)
    } else {
        (today.year(), today.month() - 1)
    };
    // Day 1 exists in every month
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
}
