//! The operations exposed to the surrounding service layer.
//!
//! [`SyncService`] wires the configuration, the fetcher, the health tracker
//! and the stores together and offers `sync`, `list_calendars` and
//! `get_events`. Bindings (HTTP routes, webhooks) sit on top of it and map
//! [`SyncError`] through [`SyncError::external_status`].

use std::fmt;
use std::sync::Arc;

use capsync_core::{ConfigError, Event, StatusFilter, SyncConfig, SyncWindow};
use capsync_providers::{CalendarFetcher, CalendarMeta, EventNormalizer, Transport};
use chrono::{DateTime, Utc};
use tracing::{debug, instrument, warn};

use crate::error::{AuthError, SyncError};
use crate::health::FeedHealthTracker;
use crate::orchestrator::{SyncOrchestrator, SyncResult};
use crate::store::{CapacityRecord, CapacityStore};
use crate::token::TokenProvider;

/// Default span of an ad-hoc event read.
pub const DEFAULT_READ_WINDOW_DAYS: i64 = 30;

/// Entry point for sync and calendar reads.
pub struct SyncService {
    config: SyncConfig,
    fetcher: CalendarFetcher,
    normalizer: EventNormalizer,
    filter: StatusFilter,
    orchestrator: SyncOrchestrator,
    health: Arc<FeedHealthTracker>,
    capacity: Arc<dyn CapacityStore>,
    tokens: Arc<dyn TokenProvider>,
}

impl fmt::Debug for SyncService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncService")
            .field("config", &self.config)
            .field("health", &self.health)
            .finish_non_exhaustive()
    }
}

impl SyncService {
    /// Builds a service from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn new(
        config: SyncConfig,
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        health: Arc<FeedHealthTracker>,
        capacity: Arc<dyn CapacityStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let fetcher = CalendarFetcher::new(transport);
        let normalizer = EventNormalizer::new(config.classifier()?);
        let filter = config.status_filter();
        let orchestrator =
            SyncOrchestrator::new(fetcher.clone(), normalizer.clone(), filter, health.clone());

        Ok(Self {
            config,
            fetcher,
            normalizer,
            filter,
            orchestrator,
            health,
            capacity,
            tokens,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn health(&self) -> &Arc<FeedHealthTracker> {
        &self.health
    }

    /// Runs a sync and stores its output.
    ///
    /// `calendar_ids` and `window_days` fall back to the configured
    /// calendars and window. The capacity store is written only when at
    /// least one calendar succeeded; a store failure is logged and does not
    /// fail the sync.
    #[instrument(skip(self, token))]
    pub async fn sync(
        &self,
        user_id: &str,
        token: &str,
        calendar_ids: Option<&[String]>,
        window_days: Option<u32>,
    ) -> Result<SyncResult, SyncError> {
        let calendar_ids = match calendar_ids {
            Some(ids) if !ids.is_empty() => ids.to_vec(),
            _ => self.config.default_calendar_ids(),
        };
        let window_days = window_days.unwrap_or(self.config.sync_window_days);

        let result = self
            .orchestrator
            .run(user_id, token, &calendar_ids, window_days)
            .await?;

        if result.calendars_succeeded() > 0 {
            let record =
                CapacityRecord::new(user_id, Utc::now(), result.window, result.events.clone());
            debug!(
                busy_minutes = record.impact.total_busy_minutes(),
                events = record.impact.event_count,
                "recording capacity impact"
            );
            if let Err(e) = self.capacity.record_sync(record).await {
                warn!(error = %e, "failed to store sync output");
            }
        }

        Ok(result)
    }

    /// Runs a sync for `user_id` with a token from the token provider.
    pub async fn sync_user(&self, user_id: &str) -> Result<SyncResult, SyncError> {
        let token = self.tokens.token(user_id).await?;
        self.sync(user_id, &token, None, None).await
    }

    /// Lists the calendars visible to the token owner.
    pub async fn list_calendars(&self, token: &str) -> Result<Vec<CalendarMeta>, SyncError> {
        require_token(token)?;
        Ok(self.fetcher.list_calendars(token).await?)
    }

    /// Reads the events of one calendar without touching feed health.
    ///
    /// The window defaults to now and runs [`DEFAULT_READ_WINDOW_DAYS`] past
    /// its start.
    pub async fn get_events(
        &self,
        token: &str,
        calendar_id: &str,
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
    ) -> Result<Vec<Event>, SyncError> {
        self.get_events_at(token, calendar_id, time_min, time_max, Utc::now())
            .await
    }

    async fn get_events_at(
        &self,
        token: &str,
        calendar_id: &str,
        time_min: Option<DateTime<Utc>>,
        time_max: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Event>, SyncError> {
        require_token(token)?;
        if calendar_id.trim().is_empty() {
            return Err(ConfigError::EmptyCalendarId.into());
        }
        let time_min = time_min.unwrap_or(now);
        let window = match time_max {
            Some(time_max) => SyncWindow::new(time_min, time_max)?,
            None => SyncWindow::starting_at(time_min, DEFAULT_READ_WINDOW_DAYS)?,
        };

        let raws = self.fetcher.list_events(token, calendar_id, &window).await?;
        let batch = self.normalizer.normalize_all(&raws, calendar_id);
        Ok(batch
            .events
            .into_iter()
            .filter(|event| self.filter.allows(event.status))
            .collect())
    }
}

fn require_token(token: &str) -> Result<(), AuthError> {
    if token.trim().is_empty() {
        Err(AuthError::MissingToken)
    } else {
        Ok(())
    }
}

/// Builds the reqwest transport described by `config`.
#[cfg(feature = "http")]
pub fn http_transport(
    config: &SyncConfig,
) -> Result<capsync_providers::HttpTransport, capsync_providers::TransportError> {
    capsync_providers::HttpTransport::new(config.api_base_url.clone(), config.request_timeout())
}
