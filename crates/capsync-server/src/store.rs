//! Capacity store seam.
//!
//! After a sync run the service hands the surviving events and their
//! [`CapacityImpact`] to a [`CapacityStore`]. Deduplication across
//! overlapping runs is the store's job.

use std::collections::HashMap;

use capsync_core::{CapacityImpact, Event, SyncWindow};
use capsync_providers::BoxFuture;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::trace;

/// A storage backend failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Everything one sync run produced for a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityRecord {
    pub user_id: String,
    pub synced_at: DateTime<Utc>,
    pub window: SyncWindow,
    pub events: Vec<Event>,
    pub impact: CapacityImpact,
}

impl CapacityRecord {
    pub fn new(
        user_id: impl Into<String>,
        synced_at: DateTime<Utc>,
        window: SyncWindow,
        events: Vec<Event>,
    ) -> Self {
        let impact = CapacityImpact::from_events(&events);
        Self {
            user_id: user_id.into(),
            synced_at,
            window,
            events,
            impact,
        }
    }
}

/// Persists sync output.
pub trait CapacityStore: Send + Sync {
    fn record_sync(&self, record: CapacityRecord) -> BoxFuture<'_, Result<(), StoreError>>;
}

/// Keeps the latest record per user in memory.
#[derive(Debug, Default)]
pub struct MemoryCapacityStore {
    records: RwLock<HashMap<String, CapacityRecord>>,
}

impl MemoryCapacityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent record written for `user_id`.
    pub async fn latest(&self, user_id: &str) -> Option<CapacityRecord> {
        self.records.read().await.get(user_id).cloned()
    }

    /// Number of users with a stored record.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl CapacityStore for MemoryCapacityStore {
    fn record_sync(&self, record: CapacityRecord) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            trace!(
                user_id = %record.user_id,
                events = record.events.len(),
                "storing capacity record"
            );
            self.records
                .write()
                .await
                .insert(record.user_id.clone(), record);
            Ok(())
        })
    }
}
