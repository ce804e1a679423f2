//! Sync configuration.
//!
//! All settings live in a single TOML document. Every field has a default, so
//! an empty file is a valid configuration:
//!
//! ```toml
//! default_sync_interval = 60
//! sync_window_days = 180
//! include_declined = false
//! include_tentative = true
//! calendar_ids = ["primary"]
//!
//! [[event_type_mapping]]
//! event_type = "focus"
//! keywords = ["focus", "no meetings"]
//!
//! [health]
//! degraded_after_failures = 3
//! unhealthy_after_hours = 12
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::classify::{EventClassifier, KeywordRule};
use crate::event::{EventStatus, EventType};

/// Base URL of the Google Calendar v3 API.
pub const GOOGLE_CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Longest sync window accepted, in days.
pub const MAX_WINDOW_DAYS: u32 = 3660;

/// Calendar synced when the caller names none.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Errors raised while loading or validating configuration, or while
/// checking sync arguments before any network call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sync window must cover 1 to {max} days, got {0}", max = MAX_WINDOW_DAYS)]
    InvalidWindowDays(u32),

    #[error("sync window starting at {time_min} cannot extend {days} days")]
    WindowOutOfRange { time_min: DateTime<Utc>, days: i64 },

    #[error("sync window is empty: {time_min} is not before {time_max}")]
    EmptyWindow {
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    },

    #[error("sync interval must be at least one minute")]
    InvalidInterval,

    #[error("calendar id must not be empty")]
    EmptyCalendarId,

    #[error("'meeting' is the fallback type and cannot be given keywords")]
    MeetingKeywords,

    #[error("event type '{0}' appears more than once in event_type_mapping")]
    DuplicateEventType(EventType),

    #[error("health threshold must be positive: {0}")]
    InvalidHealthPolicy(&'static str),

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Feed health thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthSettings {
    /// Consecutive failures that move a healthy feed to degraded.
    pub degraded_after_failures: u32,
    /// Hours since the first failure of a streak before the feed is unhealthy.
    pub unhealthy_after_hours: u32,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            degraded_after_failures: 3,
            unhealthy_after_hours: 12,
        }
    }
}

/// Which event statuses survive into a sync result.
///
/// Cancelled events never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFilter {
    pub include_declined: bool,
    pub include_tentative: bool,
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self {
            include_declined: false,
            include_tentative: true,
        }
    }
}

impl StatusFilter {
    pub fn allows(&self, status: EventStatus) -> bool {
        match status {
            EventStatus::Confirmed => true,
            EventStatus::Tentative => self.include_tentative,
            EventStatus::Declined => self.include_declined,
            EventStatus::Cancelled => false,
        }
    }
}

/// Configuration for the sync engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minutes between scheduled sync runs.
    pub default_sync_interval: u32,
    /// Days ahead of now covered by a sync run.
    pub sync_window_days: u32,
    pub include_declined: bool,
    pub include_tentative: bool,
    /// Keyword overrides for the classifier.
    pub event_type_mapping: Vec<KeywordRule>,
    /// Calendars synced when the caller names none.
    pub calendar_ids: Vec<String>,
    pub api_base_url: String,
    /// Timeout applied to each outbound request.
    pub request_timeout_secs: u64,
    pub health: HealthSettings,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_sync_interval: 60,
            sync_window_days: 180,
            include_declined: false,
            include_tentative: true,
            event_type_mapping: Vec::new(),
            calendar_ids: vec![DEFAULT_CALENDAR_ID.to_string()],
            api_base_url: GOOGLE_CALENDAR_API_BASE.to_string(),
            request_timeout_secs: 30,
            health: HealthSettings::default(),
        }
    }
}

impl SyncConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and the keyword table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_sync_interval == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        if !(1..=MAX_WINDOW_DAYS).contains(&self.sync_window_days) {
            return Err(ConfigError::InvalidWindowDays(self.sync_window_days));
        }
        if self.calendar_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ConfigError::EmptyCalendarId);
        }
        if self.health.degraded_after_failures == 0 {
            return Err(ConfigError::InvalidHealthPolicy("degraded_after_failures"));
        }
        if self.health.unhealthy_after_hours == 0 {
            return Err(ConfigError::InvalidHealthPolicy("unhealthy_after_hours"));
        }
        self.classifier().map(|_| ())
    }

    /// Builds the classifier described by `event_type_mapping`.
    pub fn classifier(&self) -> Result<EventClassifier, ConfigError> {
        EventClassifier::with_overrides(&self.event_type_mapping)
    }

    pub fn status_filter(&self) -> StatusFilter {
        StatusFilter {
            include_declined: self.include_declined,
            include_tentative: self.include_tentative,
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.default_sync_interval) * 60)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Calendars to sync when the caller passes none.
    pub fn default_calendar_ids(&self) -> Vec<String> {
        if self.calendar_ids.is_empty() {
            vec![DEFAULT_CALENDAR_ID.to_string()]
        } else {
            self.calendar_ids.clone()
        }
    }
}
