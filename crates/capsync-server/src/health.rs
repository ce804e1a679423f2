//! Feed health tracking.
//!
//! Every (user, calendar) pair is a feed with its own [`FeedHealth`]. Each
//! sync attempt for a calendar is reported as an [`Observation`] and run
//! through [`FeedHealth::apply`], which is the complete transition table:
//!
//! | state       | observation | condition                               | next        | alert     |
//! |-------------|-------------|-----------------------------------------|-------------|-----------|
//! | Healthy     | failure     | failures >= `degraded_after_failures`   | Degraded    | -         |
//! | not Unhealthy | failure   | now - first failure >= `unhealthy_after`| Unhealthy   | Unhealthy |
//! | Unhealthy   | failure     |                                         | Unhealthy   | -         |
//! | Degraded / Unhealthy | success |                                  | Healthy     | Recovered |
//! | Healthy     | success     |                                         | Healthy     | -         |
//!
//! The unhealthy alert fires only on entry, so it is sent once per failing
//! streak. [`FeedHealthTracker`] serializes observations per feed, persists
//! the state through a [`FeedHealthStore`] and delivers alerts to a
//! [`NotificationSink`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use capsync_core::{ConfigError, HealthSettings};
use capsync_providers::BoxFuture;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info, warn};

use crate::notify::{AlertKind, FeedAlert, NotificationSink};
use crate::store::StoreError;

/// Health of one feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    #[default]
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds driving the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub degraded_after_failures: u32,
    pub unhealthy_after: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            degraded_after_failures: 3,
            unhealthy_after: Duration::hours(12),
        }
    }
}

impl TryFrom<&HealthSettings> for HealthPolicy {
    type Error = ConfigError;

    fn try_from(settings: &HealthSettings) -> Result<Self, Self::Error> {
        if settings.degraded_after_failures == 0 {
            return Err(ConfigError::InvalidHealthPolicy("degraded_after_failures"));
        }
        if settings.unhealthy_after_hours == 0 {
            return Err(ConfigError::InvalidHealthPolicy("unhealthy_after_hours"));
        }
        Ok(Self {
            degraded_after_failures: settings.degraded_after_failures,
            unhealthy_after: Duration::hours(i64::from(settings.unhealthy_after_hours)),
        })
    }
}

/// Identifies one feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedKey {
    pub user_id: String,
    pub calendar_id: String,
}

impl FeedKey {
    pub fn new(user_id: impl Into<String>, calendar_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            calendar_id: calendar_id.into(),
        }
    }
}

impl fmt::Display for FeedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.calendar_id)
    }
}

/// Outcome of one sync attempt for one calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Success,
    Failure { error: String },
}

impl Observation {
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Failure {
            error: error.into(),
        }
    }
}

/// Mutable health state of one feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedHealth {
    pub status: HealthStatus,
    pub consecutive_failures: u32,
    /// Start of the current failing streak.
    pub first_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl FeedHealth {
    /// Applies one observation and returns the alert to emit, if any.
    pub fn apply(
        &mut self,
        observation: &Observation,
        now: DateTime<Utc>,
        policy: &HealthPolicy,
    ) -> Option<AlertKind> {
        match observation {
            Observation::Success => {
                let previous = self.status;
                self.status = HealthStatus::Healthy;
                self.consecutive_failures = 0;
                self.first_failure_at = None;
                self.last_success_at = Some(now);
                self.last_error = None;

                (previous != HealthStatus::Healthy).then_some(AlertKind::Recovered { previous })
            }
            Observation::Failure { error } => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                let first_failure_at = *self.first_failure_at.get_or_insert(now);
                self.last_error = Some(error.clone());

                if self.status == HealthStatus::Healthy
                    && self.consecutive_failures >= policy.degraded_after_failures
                {
                    self.status = HealthStatus::Degraded;
                }

                if self.status != HealthStatus::Unhealthy
                    && now - first_failure_at >= policy.unhealthy_after
                {
                    self.status = HealthStatus::Unhealthy;
                    return Some(AlertKind::Unhealthy);
                }
                None
            }
        }
    }
}

/// Durable storage for feed health.
pub trait FeedHealthStore: Send + Sync {
    fn load<'a>(&'a self, key: &'a FeedKey)
    -> BoxFuture<'a, Result<Option<FeedHealth>, StoreError>>;

    fn save<'a>(
        &'a self,
        key: &'a FeedKey,
        health: &'a FeedHealth,
    ) -> BoxFuture<'a, Result<(), StoreError>>;

    /// All feeds of one user.
    fn list<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<(FeedKey, FeedHealth)>, StoreError>>;
}

/// In-process health store.
#[derive(Debug, Default)]
pub struct MemoryHealthStore {
    feeds: RwLock<HashMap<FeedKey, FeedHealth>>,
}

impl MemoryHealthStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedHealthStore for MemoryHealthStore {
    fn load<'a>(
        &'a self,
        key: &'a FeedKey,
    ) -> BoxFuture<'a, Result<Option<FeedHealth>, StoreError>> {
        Box::pin(async move { Ok(self.feeds.read().await.get(key).cloned()) })
    }

    fn save<'a>(
        &'a self,
        key: &'a FeedKey,
        health: &'a FeedHealth,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        Box::pin(async move {
            self.feeds.write().await.insert(key.clone(), health.clone());
            Ok(())
        })
    }

    fn list<'a>(
        &'a self,
        user_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<(FeedKey, FeedHealth)>, StoreError>> {
        Box::pin(async move {
            let mut feeds: Vec<_> = self
                .feeds
                .read()
                .await
                .iter()
                .filter(|(key, _)| key.user_id == user_id)
                .map(|(key, health)| (key.clone(), health.clone()))
                .collect();
            feeds.sort_by(|a, b| a.0.cmp(&b.0));
            Ok(feeds)
        })
    }
}

/// Applies observations to feeds and emits alerts.
pub struct FeedHealthTracker {
    store: Arc<dyn FeedHealthStore>,
    sink: Arc<dyn NotificationSink>,
    policy: HealthPolicy,
    // One lock per feed; load-apply-save-notify runs under it.
    locks: Mutex<HashMap<FeedKey, Arc<Mutex<()>>>>,
}

impl fmt::Debug for FeedHealthTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedHealthTracker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl FeedHealthTracker {
    pub fn new(
        store: Arc<dyn FeedHealthStore>,
        sink: Arc<dyn NotificationSink>,
        policy: HealthPolicy,
    ) -> Self {
        Self {
            store,
            sink,
            policy,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    /// Records an observation made now.
    pub async fn observe(
        &self,
        user_id: &str,
        calendar_id: &str,
        observation: Observation,
    ) -> Result<FeedHealth, StoreError> {
        self.observe_at(user_id, calendar_id, observation, Utc::now())
            .await
    }

    /// Records an observation made at `now`.
    ///
    /// Observations for the same feed are applied one at a time, in the
    /// order they acquire the feed lock.
    pub async fn observe_at(
        &self,
        user_id: &str,
        calendar_id: &str,
        observation: Observation,
        now: DateTime<Utc>,
    ) -> Result<FeedHealth, StoreError> {
        let key = FeedKey::new(user_id, calendar_id);
        let lock = self.feed_lock(&key).await;
        let result = {
            let _guard = lock.lock().await;
            self.apply_observation(&key, &observation, now).await
        };
        self.release_feed_lock(&key, lock).await;
        result
    }

    async fn apply_observation(
        &self,
        key: &FeedKey,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> Result<FeedHealth, StoreError> {
        let mut health = self.store.load(key).await?.unwrap_or_default();
        let previous = health.status;
        let alert = health.apply(observation, now, &self.policy);
        self.store.save(key, &health).await?;

        log_transition(key, previous, &health);

        if let Some(kind) = alert {
            self.sink
                .notify(FeedAlert {
                    user_id: key.user_id.clone(),
                    calendar_id: key.calendar_id.clone(),
                    kind,
                    consecutive_failures: health.consecutive_failures,
                    at: now,
                    last_error: health.last_error.clone(),
                })
                .await;
        }

        Ok(health)
    }

    /// Current health of a feed, `None` if it was never observed.
    pub async fn health(
        &self,
        user_id: &str,
        calendar_id: &str,
    ) -> Result<Option<FeedHealth>, StoreError> {
        self.store.load(&FeedKey::new(user_id, calendar_id)).await
    }

    /// Health of every observed feed of a user, ordered by calendar id.
    pub async fn snapshot(&self, user_id: &str) -> Result<Vec<(FeedKey, FeedHealth)>, StoreError> {
        self.store.list(user_id).await
    }

    async fn feed_lock(&self, key: &FeedKey) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .await
            .entry(key.clone())
            .or_default()
            .clone()
    }

    // Clones are only handed out under the map lock, so a count of two (the
    // map entry and ours) means no other observation is waiting on this feed.
    async fn release_feed_lock(&self, key: &FeedKey, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().await;
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }
}

fn log_transition(key: &FeedKey, previous: HealthStatus, health: &FeedHealth) {
    if previous == health.status {
        return;
    }
    match health.status {
        HealthStatus::Degraded => warn!(
            feed = %key,
            failures = health.consecutive_failures,
            "feed degraded"
        ),
        HealthStatus::Unhealthy => error!(
            feed = %key,
            failures = health.consecutive_failures,
            since = ?health.first_failure_at,
            "feed unhealthy"
        ),
        HealthStatus::Healthy => info!(feed = %key, previous = %previous, "feed healthy again"),
    }
}
