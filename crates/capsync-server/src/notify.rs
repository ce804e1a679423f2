//! Feed health alerts.
//!
//! The health tracker emits a [`FeedAlert`] whenever a feed enters the
//! unhealthy state or recovers from a failing streak. Delivery is the job of
//! a [`NotificationSink`]:
//! - [`LogNotificationSink`] writes alerts to the tracing log
//! - [`ChannelNotificationSink`] forwards them over a tokio channel

use capsync_providers::BoxFuture;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::health::HealthStatus;

/// What happened to the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlertKind {
    /// The feed entered the unhealthy state.
    Unhealthy,
    /// The feed succeeded again after being degraded or unhealthy.
    Recovered { previous: HealthStatus },
}

/// One health-change alert for a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedAlert {
    pub user_id: String,
    pub calendar_id: String,
    pub kind: AlertKind,
    /// Failures in the streak; zero for recoveries.
    pub consecutive_failures: u32,
    pub at: DateTime<Utc>,
    /// Last error seen before the alert, if any.
    pub last_error: Option<String>,
}

/// Delivers feed alerts.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, alert: FeedAlert) -> BoxFuture<'_, ()>;
}

/// Writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

impl NotificationSink for LogNotificationSink {
    fn notify(&self, alert: FeedAlert) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            match alert.kind {
                AlertKind::Unhealthy => error!(
                    user_id = %alert.user_id,
                    calendar_id = %alert.calendar_id,
                    failures = alert.consecutive_failures,
                    last_error = alert.last_error.as_deref().unwrap_or(""),
                    "feed unhealthy"
                ),
                AlertKind::Recovered { previous } => info!(
                    user_id = %alert.user_id,
                    calendar_id = %alert.calendar_id,
                    previous = %previous,
                    "feed recovered"
                ),
            }
        })
    }
}

/// Sends alerts to a channel receiver.
///
/// A closed receiver drops the alert.
#[derive(Debug, Clone)]
pub struct ChannelNotificationSink {
    tx: mpsc::UnboundedSender<FeedAlert>,
}

impl ChannelNotificationSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FeedAlert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotificationSink {
    fn notify(&self, alert: FeedAlert) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self.tx.send(alert) {
                debug!(calendar_id = %e.0.calendar_id, "alert receiver closed, dropping alert");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(kind: AlertKind) -> FeedAlert {
        FeedAlert {
            user_id: "u1".into(),
            calendar_id: "team".into(),
            kind,
            consecutive_failures: 7,
            at: Utc::now(),
            last_error: Some("forbidden".into()),
        }
    }

    #[tokio::test]
    async fn channel_sink_delivers() {
        let (sink, mut rx) = ChannelNotificationSink::new();
        sink.notify(alert(AlertKind::Unhealthy)).await;
        sink.notify(alert(AlertKind::Recovered {
            previous: HealthStatus::Unhealthy,
        }))
        .await;

        assert_eq!(rx.recv().await.unwrap().kind, AlertKind::Unhealthy);
        assert_eq!(
            rx.recv().await.unwrap().kind,
            AlertKind::Recovered {
                previous: HealthStatus::Unhealthy
            }
        );
    }

    #[tokio::test]
    async fn channel_sink_tolerates_closed_receiver() {
        let (sink, rx) = ChannelNotificationSink::new();
        drop(rx);
        sink.notify(alert(AlertKind::Unhealthy)).await;
    }

    #[tokio::test]
    async fn log_sink_does_not_panic() {
        LogNotificationSink.notify(alert(AlertKind::Unhealthy)).await;
    }

    #[test]
    fn alert_kind_serializes_with_tag() {
        let json = serde_json::to_value(AlertKind::Recovered {
            previous: HealthStatus::Degraded,
        })
        .unwrap();
        assert_eq!(json["kind"], "recovered");
        assert_eq!(json["previous"], "degraded");
    }
}
