//! Multi-calendar sync runs.
//!
//! A run walks the requested calendars in order. Each calendar is fetched,
//! normalized and filtered on its own; a failing calendar is recorded in the
//! result and the run moves on. Every calendar yields exactly one health
//! observation.

use std::sync::Arc;

use capsync_core::{ConfigError, DEFAULT_CALENDAR_ID, Event, StatusFilter, SyncWindow};
use capsync_providers::{CalendarFetcher, EventNormalizer, ProviderError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, SyncError};
use crate::health::{FeedHealthTracker, Observation};

/// One calendar that could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarFailure {
    pub calendar_id: String,
    pub error: String,
    /// Upstream HTTP status, absent for timeouts and connection failures.
    pub status_code: Option<u16>,
}

impl CalendarFailure {
    fn from_provider(calendar_id: &str, error: &ProviderError) -> Self {
        Self {
            calendar_id: calendar_id.to_string(),
            error: error.message().to_string(),
            status_code: error.status_code(),
        }
    }
}

/// Outcome of a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Events of the successful calendars, calendar by calendar, each in
    /// provider order.
    pub events: Vec<Event>,
    pub calendars_attempted: usize,
    pub calendars_failed: Vec<CalendarFailure>,
    /// Malformed events dropped during normalization.
    pub events_skipped: usize,
    pub window: SyncWindow,
}

impl SyncResult {
    pub fn events_synced(&self) -> usize {
        self.events.len()
    }

    pub fn calendars_succeeded(&self) -> usize {
        self.calendars_attempted - self.calendars_failed.len()
    }

    pub fn is_complete(&self) -> bool {
        self.calendars_failed.is_empty()
    }
}

/// Drives sync runs across calendars.
#[derive(Debug, Clone)]
pub struct SyncOrchestrator {
    fetcher: CalendarFetcher,
    normalizer: EventNormalizer,
    filter: StatusFilter,
    health: Arc<FeedHealthTracker>,
}

impl SyncOrchestrator {
    pub fn new(
        fetcher: CalendarFetcher,
        normalizer: EventNormalizer,
        filter: StatusFilter,
        health: Arc<FeedHealthTracker>,
    ) -> Self {
        Self {
            fetcher,
            normalizer,
            filter,
            health,
        }
    }

    /// Syncs `calendar_ids` (or the primary calendar when empty) over the
    /// next `window_days` days.
    ///
    /// # Errors
    ///
    /// Fails before any network call on a blank token, a window outside
    /// `1..=MAX_WINDOW_DAYS` days or a blank calendar id. Calendar fetch failures never fail the run.
    pub async fn run(
        &self,
        user_id: &str,
        token: &str,
        calendar_ids: &[String],
        window_days: u32,
    ) -> Result<SyncResult, SyncError> {
        self.run_at(user_id, token, calendar_ids, window_days, Utc::now())
            .await
    }

    /// Like [`run`](Self::run) with the window anchored at `now`.
    #[instrument(skip(self, token, now), fields(calendars = calendar_ids.len()))]
    pub async fn run_at(
        &self,
        user_id: &str,
        token: &str,
        calendar_ids: &[String],
        window_days: u32,
        now: DateTime<Utc>,
    ) -> Result<SyncResult, SyncError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken.into());
        }
        let window = SyncWindow::from_days(now, window_days)?;
        let calendar_ids = resolve_calendar_ids(calendar_ids)?;

        let mut result = SyncResult {
            events: Vec::new(),
            calendars_attempted: 0,
            calendars_failed: Vec::new(),
            events_skipped: 0,
            window,
        };

        for calendar_id in &calendar_ids {
            result.calendars_attempted += 1;

            let observation = match self.fetcher.list_events(token, calendar_id, &window).await {
                Ok(raws) => {
                    let batch = self.normalizer.normalize_all(&raws, calendar_id);
                    let fetched = batch.events.len();
                    result.events_skipped += batch.skipped.len();
                    result.events.extend(
                        batch
                            .events
                            .into_iter()
                            .filter(|event| self.filter.allows(event.status)),
                    );
                    debug!(
                        calendar_id = %calendar_id,
                        fetched,
                        skipped = batch.skipped.len(),
                        "calendar synced"
                    );
                    Observation::Success
                }
                Err(e) => {
                    warn!(
                        calendar_id = %calendar_id,
                        status = ?e.status_code(),
                        retryable = e.is_retryable(),
                        error = %e,
                        "calendar sync failed"
                    );
                    result
                        .calendars_failed
                        .push(CalendarFailure::from_provider(calendar_id, &e));
                    Observation::failure(e.message())
                }
            };

            if let Err(e) = self
                .health
                .observe_at(user_id, calendar_id, observation, now)
                .await
            {
                warn!(calendar_id = %calendar_id, error = %e, "failed to record feed health");
            }
        }

        info!(
            events = result.events_synced(),
            attempted = result.calendars_attempted,
            failed = result.calendars_failed.len(),
            skipped = result.events_skipped,
            "sync run finished"
        );
        Ok(result)
    }
}

fn resolve_calendar_ids(calendar_ids: &[String]) -> Result<Vec<String>, ConfigError> {
    if calendar_ids.is_empty() {
        return Ok(vec![DEFAULT_CALENDAR_ID.to_string()]);
    }
    if calendar_ids.iter().any(|id| id.trim().is_empty()) {
        return Err(ConfigError::EmptyCalendarId);
    }
    Ok(calendar_ids.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::{HealthPolicy, HealthStatus, MemoryHealthStore};
    use crate::notify::LogNotificationSink;
    use capsync_core::{EventClassifier, EventStatus, EventType};
    use capsync_providers::{CannedTransport, TransportError};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    fn orchestrator(transport: Arc<CannedTransport>) -> (SyncOrchestrator, Arc<FeedHealthTracker>) {
        let health = Arc::new(FeedHealthTracker::new(
            Arc::new(MemoryHealthStore::new()),
            Arc::new(LogNotificationSink),
            HealthPolicy::default(),
        ));
        let orchestrator = SyncOrchestrator::new(
            CalendarFetcher::new(transport),
            EventNormalizer::new(EventClassifier::default()),
            StatusFilter::default(),
            health.clone(),
        );
        (orchestrator, health)
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    const PRIMARY_EVENTS: &str = r#"{
        "items": [
            {
                "id": "offsite",
                "summary": "Team Offsite Trip",
                "start": {"date": "2025-03-20"},
                "end": {"date": "2025-03-22"}
            },
            {
                "id": "one-on-one",
                "summary": "1:1 sync",
                "start": {"dateTime": "2025-03-11T09:00:00Z"},
                "end": {"dateTime": "2025-03-11T09:30:00Z"}
            }
        ]
    }"#;

    #[tokio::test]
    async fn failing_calendar_does_not_abort_run() {
        let transport = Arc::new(
            CannedTransport::new()
                .with_response(
                    "/calendars/team/events",
                    403,
                    r#"{"error":{"code":403,"message":"Forbidden"}}"#,
                )
                .with_response("/calendars/primary/events", 200, PRIMARY_EVENTS),
        );
        let (orchestrator, health) = orchestrator(transport);

        let result = orchestrator
            .run_at("u1", "tok", &ids(&["team", "primary"]), 30, now())
            .await
            .unwrap();

        assert_eq!(result.events_synced(), 2);
        assert!(result.events.iter().all(|e| e.calendar_id == "primary"));
        assert_eq!(result.calendars_attempted, 2);
        assert_eq!(result.calendars_succeeded(), 1);
        assert_eq!(
            result.calendars_failed,
            vec![CalendarFailure {
                calendar_id: "team".into(),
                error: "Forbidden".into(),
                status_code: Some(403),
            }]
        );

        let team = health.health("u1", "team").await.unwrap().unwrap();
        assert_eq!(team.consecutive_failures, 1);
        assert_eq!(team.last_error.as_deref(), Some("Forbidden"));
        let primary = health.health("u1", "primary").await.unwrap().unwrap();
        assert_eq!(primary.status, HealthStatus::Healthy);
        assert_eq!(primary.last_success_at, Some(now()));
    }

    #[tokio::test]
    async fn events_keep_calendar_then_provider_order() {
        let transport = Arc::new(
            CannedTransport::new()
                .with_response("/calendars/primary/events", 200, PRIMARY_EVENTS)
                .with_response(
                    "/calendars/team/events",
                    200,
                    r#"{"items":[{"id":"t1","summary":"Workshop","start":{"date":"2025-03-12"},"end":{"date":"2025-03-13"}}]}"#,
                ),
        );
        let (orchestrator, _) = orchestrator(transport);

        let result = orchestrator
            .run_at("u1", "tok", &ids(&["primary", "team"]), 30, now())
            .await
            .unwrap();

        let order: Vec<_> = result.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(order, vec!["offsite", "one-on-one", "t1"]);
        assert_eq!(result.events[0].event_type, EventType::Travel);
        assert!(result.events[0].all_day);
        assert_eq!(result.events[1].event_type, EventType::Meeting);
        assert!(!result.events[1].all_day);
        assert_eq!(result.events[2].event_type, EventType::Training);
        assert!(result.is_complete());
    }

    #[tokio::test]
    async fn defaults_to_primary() {
        let transport = Arc::new(
            CannedTransport::new().with_response("/calendars/primary/events", 200, r#"{"items":[]}"#),
        );
        let (orchestrator, _) = orchestrator(transport.clone());

        let result = orchestrator.run_at("u1", "tok", &[], 7, now()).await.unwrap();

        assert_eq!(result.calendars_attempted, 1);
        assert_eq!(transport.requests()[0].path, "/calendars/primary/events");
        assert_eq!(
            result.window.time_max() - result.window.time_min(),
            chrono::Duration::days(7)
        );
    }

    #[tokio::test]
    async fn rejects_bad_arguments_before_fetching() {
        let transport = Arc::new(CannedTransport::new());
        let (orchestrator, _) = orchestrator(transport.clone());

        let err = orchestrator
            .run_at("u1", "  ", &ids(&["primary"]), 30, now())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Auth(AuthError::MissingToken)));

        let err = orchestrator
            .run_at("u1", "tok", &ids(&["primary"]), 0, now())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::InvalidWindowDays(0))));

        let err = orchestrator
            .run_at("u1", "tok", &ids(&["primary"]), u32::MAX, now())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::InvalidWindowDays(u32::MAX))));
        assert_eq!(err.external_status(), 400);

        let err = orchestrator
            .run_at("u1", "tok", &ids(&["primary", ""]), 30, now())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Config(ConfigError::EmptyCalendarId)));

        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn filters_by_status_and_skips_malformed() {
        let transport = Arc::new(CannedTransport::new().with_response(
            "/calendars/primary/events",
            200,
            r#"{"items":[
                {"id":"c","status":"cancelled","start":{"date":"2025-03-12"},"end":{"date":"2025-03-13"}},
                {"id":"t","status":"tentative","start":{"date":"2025-03-12"},"end":{"date":"2025-03-13"}},
                {"id":"d","start":{"date":"2025-03-12"},"end":{"date":"2025-03-13"},
                 "attendees":[{"email":"me@example.com","self":true,"responseStatus":"declined"}]},
                {"id":"broken"},
                {"id":"ok","start":{"date":"2025-03-12"},"end":{"date":"2025-03-13"}}
            ]}"#,
        ));
        let (orchestrator, _) = orchestrator(transport);

        let result = orchestrator
            .run_at("u1", "tok", &ids(&["primary"]), 30, now())
            .await
            .unwrap();

        let kept: Vec<_> = result.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(kept, vec!["t", "ok"]);
        assert_eq!(result.events[0].status, EventStatus::Tentative);
        assert_eq!(result.events_skipped, 1);
    }

    #[tokio::test]
    async fn timeout_is_recorded_without_status() {
        let transport = Arc::new(
            CannedTransport::new().with_failure("/calendars/primary/events", TransportError::Timeout),
        );
        let (orchestrator, health) = orchestrator(transport);

        let result = orchestrator
            .run_at("u1", "tok", &ids(&["primary"]), 30, now())
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.calendars_failed[0].status_code, None);
        assert_eq!(result.calendars_failed[0].error, "request timed out");
        assert_eq!(
            health
                .health("u1", "primary")
                .await
                .unwrap()
                .unwrap()
                .consecutive_failures,
            1
        );
    }
}
