//! Time types for calendar events.
//!
//! This module provides [`EventTime`] for representing event start/end times
//! (which may be either a specific datetime or an all-day date), and
//! [`SyncWindow`] for the range of time a sync run covers.

use std::cmp::Ordering;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, MAX_WINDOW_DAYS};

/// Represents the start or end of a calendar event.
///
/// Providers report either a full timestamp or a bare date. The bare date
/// form is what marks an event as all-day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum EventTime {
    /// A specific instant, stored in UTC.
    DateTime(DateTime<Utc>),
    /// A date without a time of day.
    AllDay(NaiveDate),
}

impl EventTime {
    /// Creates a new `EventTime::DateTime` from a UTC datetime.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }

    /// Creates a new `EventTime::AllDay` from a date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self::AllDay(date)
    }

    /// Returns `true` if this is a date-only value.
    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::AllDay(_))
    }

    /// Converts to a UTC datetime for comparison purposes.
    ///
    /// For all-day values, returns midnight UTC on that date.
    pub fn to_utc_datetime(&self) -> DateTime<Utc> {
        match self {
            Self::DateTime(dt) => *dt,
            Self::AllDay(date) => date.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    /// Returns the date portion of this event time.
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::DateTime(dt) => dt.date_naive(),
            Self::AllDay(date) => *date,
        }
    }
}

impl PartialOrd for EventTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_utc_datetime().cmp(&other.to_utc_datetime())
    }
}

/// The range of time covered by a sync run.
///
/// Half-open interval `[time_min, time_max)` in UTC; `time_min` is always
/// strictly before `time_max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncWindow {
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
}

impl SyncWindow {
    /// Creates a window from explicit bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyWindow`] unless `time_min < time_max`.
    pub fn new(time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Result<Self, ConfigError> {
        if time_min >= time_max {
            return Err(ConfigError::EmptyWindow { time_min, time_max });
        }
        Ok(Self { time_min, time_max })
    }

    /// Creates a window that starts at `now` and extends `days` days ahead.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidWindowDays`] when `days` is zero or
    /// above [`MAX_WINDOW_DAYS`], and [`ConfigError::WindowOutOfRange`] when
    /// the end is not representable.
    pub fn from_days(now: DateTime<Utc>, days: u32) -> Result<Self, ConfigError> {
        if !(1..=MAX_WINDOW_DAYS).contains(&days) {
            return Err(ConfigError::InvalidWindowDays(days));
        }
        Self::starting_at(now, i64::from(days))
    }

    /// Creates a window of `days` days starting at `time_min`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::WindowOutOfRange`] when the end overflows the
    /// calendar range, or [`ConfigError::EmptyWindow`] for non-positive
    /// `days`.
    pub fn starting_at(time_min: DateTime<Utc>, days: i64) -> Result<Self, ConfigError> {
        let time_max = Duration::try_days(days)
            .and_then(|span| time_min.checked_add_signed(span))
            .ok_or(ConfigError::WindowOutOfRange { time_min, days })?;
        Self::new(time_min, time_max)
    }

    /// Lower bound (inclusive).
    pub fn time_min(&self) -> DateTime<Utc> {
        self.time_min
    }

    /// Upper bound (exclusive).
    pub fn time_max(&self) -> DateTime<Utc> {
        self.time_max
    }

    /// Length of the window.
    pub fn duration(&self) -> Duration {
        self.time_max - self.time_min
    }

    /// Checks whether the given instant falls inside the window.
    pub fn contains(&self, dt: DateTime<Utc>) -> bool {
        self.time_min <= dt && dt < self.time_max
    }
}
