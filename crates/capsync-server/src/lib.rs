//! Sync engine: orchestration, feed health, scheduling.
//!
//! This crate drives calendar syncs for users and tracks the health of each
//! (user, calendar) feed:
//! - [`SyncOrchestrator`] runs one sync across calendars with partial-failure
//!   semantics
//! - [`FeedHealthTracker`] applies the Healthy/Degraded/Unhealthy state
//!   machine and emits alerts through a [`NotificationSink`]
//! - [`SyncService`] exposes `sync`, `list_calendars` and `get_events`, and
//!   writes results to a [`CapacityStore`]
//! - [`Scheduler`] triggers syncs periodically
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use capsync_core::SyncConfig;
//! use capsync_server::{
//!     FeedHealthTracker, HealthPolicy, LogNotificationSink, MemoryCapacityStore,
//!     MemoryHealthStore, StaticTokenProvider, SyncService, http_transport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SyncConfig::default();
//!     let health = Arc::new(FeedHealthTracker::new(
//!         Arc::new(MemoryHealthStore::new()),
//!         Arc::new(LogNotificationSink),
//!         HealthPolicy::try_from(&config.health)?,
//!     ));
//!     let service = SyncService::new(
//!         config.clone(),
//!         Arc::new(http_transport(&config)?),
//!         Arc::new(StaticTokenProvider::new().with_token("alice", "ya29...")),
//!         health,
//!         Arc::new(MemoryCapacityStore::new()),
//!     )?;
//!
//!     let result = service.sync_user("alice").await?;
//!     println!("{} events, {} failed calendars", result.events_synced(), result.calendars_failed.len());
//!     Ok(())
//! }
//! ```

mod error;
mod health;
mod notify;
mod orchestrator;
mod scheduler;
mod service;
mod store;
mod token;

pub use error::{AuthError, SyncError};
pub use health::{
    FeedHealth, FeedHealthStore, FeedHealthTracker, FeedKey, HealthPolicy, HealthStatus,
    MemoryHealthStore, Observation,
};
pub use notify::{
    AlertKind, ChannelNotificationSink, FeedAlert, LogNotificationSink, NotificationSink,
};
pub use orchestrator::{CalendarFailure, SyncOrchestrator, SyncResult};
pub use scheduler::{
    Scheduler, SchedulerCommand, SchedulerConfig, SchedulerHandle, SchedulerState,
    SharedSchedulerState,
};
#[cfg(feature = "http")]
pub use service::http_transport;
pub use service::{DEFAULT_READ_WINDOW_DAYS, SyncService};
pub use store::{CapacityRecord, CapacityStore, MemoryCapacityStore, StoreError};
pub use token::{StaticTokenProvider, TokenProvider};
