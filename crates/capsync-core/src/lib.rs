//! Core types: events, classification, sync windows, configuration, tracing

pub mod capacity;
pub mod classify;
pub mod config;
pub mod event;
pub mod time;
pub mod tracing;

pub use capacity::CapacityImpact;
pub use classify::{EventClassifier, KeywordRule, default_rules};
pub use config::{
    ConfigError, DEFAULT_CALENDAR_ID, GOOGLE_CALENDAR_API_BASE, HealthSettings, MAX_WINDOW_DAYS,
    StatusFilter, SyncConfig,
};
pub use event::{DEFAULT_VISIBILITY, Event, EventStatus, EventType};
pub use time::{EventTime, SyncWindow};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
