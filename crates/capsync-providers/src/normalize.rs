//! RawEvent to Event conversion.
//!
//! This is the only place that knows Google's event field names. The raw
//! JSON is decoded into private wire structs and mapped onto the canonical
//! [`Event`]:
//!
//! 1. resolve start/end into [`EventTime`] (date-only means all-day)
//! 2. fall back to `"Untitled Event"` for missing titles and classify them
//! 3. collect attendee emails, recurrence and visibility
//!
//! Normalization is pure: the same raw event always yields the same `Event`.

use capsync_core::{DEFAULT_VISIBILITY, Event, EventClassifier, EventStatus, EventTime};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::MalformedEventError;
use crate::raw_event::RawEvent;

/// Title used when the provider has none.
pub const UNTITLED_EVENT: &str = "Untitled Event";

/// Events of one calendar after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedBatch {
    /// Normalized events in provider order.
    pub events: Vec<Event>,
    /// Malformed events that were skipped.
    pub skipped: Vec<MalformedEventError>,
}

/// Converts provider payloads into canonical events.
#[derive(Debug, Clone, Default)]
pub struct EventNormalizer {
    classifier: EventClassifier,
}

impl EventNormalizer {
    pub fn new(classifier: EventClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &EventClassifier {
        &self.classifier
    }

    /// Normalizes one raw event fetched from `calendar_id`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedEventError`] when the id, start or end cannot be
    /// recovered from the payload.
    pub fn normalize(&self, raw: &RawEvent, calendar_id: &str) -> Result<Event, MalformedEventError> {
        let api = ApiEvent::deserialize(raw.as_value()).map_err(|e| {
            MalformedEventError::new(
                raw.as_value()
                    .get("id")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
                format!("unexpected payload shape: {}", e),
            )
        })?;

        let id = api
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MalformedEventError::new(None, "missing id"))?;
        let start = resolve_time(api.start.as_ref(), &id, "start")?;
        let end = resolve_time(api.end.as_ref(), &id, "end")?;

        let title = api
            .summary
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNTITLED_EVENT.to_string());
        let event_type = self.classifier.classify(&title);

        let attendees = api.attendees.unwrap_or_default();
        let self_declined = attendees
            .iter()
            .any(|a| a.is_self == Some(true) && a.response_status.as_deref() == Some("declined"));
        let status = if self_declined {
            EventStatus::Declined
        } else {
            EventStatus::from_provider(api.status.as_deref())
        };
        let attendee_emails = attendees.into_iter().filter_map(|a| a.email).collect();

        let recurring = api
            .recurring_event_id
            .is_some_and(|series| !series.is_empty());

        Ok(Event::new(id, calendar_id, title, start, end, event_type)
            .with_description(api.description)
            .with_location(api.location)
            .with_status(status)
            .with_attendees(attendee_emails)
            .with_recurring(recurring)
            .with_visibility(api.visibility.unwrap_or_else(|| DEFAULT_VISIBILITY.to_string()))
            .with_external_link(api.html_link))
    }

    /// Normalizes every raw event of a calendar, skipping malformed ones.
    pub fn normalize_all(&self, raws: &[RawEvent], calendar_id: &str) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        for raw in raws {
            match self.normalize(raw, calendar_id) {
                Ok(event) => batch.events.push(event),
                Err(e) => {
                    warn!(calendar_id, error = %e, "skipping malformed event");
                    batch.skipped.push(e);
                }
            }
        }
        batch
    }
}

fn resolve_time(
    time: Option<&ApiEventTime>,
    event_id: &str,
    field: &str,
) -> Result<EventTime, MalformedEventError> {
    let malformed = |reason: String| MalformedEventError::new(Some(event_id.to_string()), reason);
    let time = time.ok_or_else(|| malformed(format!("missing {}", field)))?;

    if let Some(ref value) = time.date_time {
        return parse_datetime(value)
            .map(EventTime::from_utc)
            .ok_or_else(|| malformed(format!("unparseable {} dateTime '{}'", field, value)));
    }
    if let Some(ref value) = time.date {
        return NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(EventTime::from_date)
            .map_err(|_| malformed(format!("unparseable {} date '{}'", field, value)));
    }
    Err(malformed(format!("missing {}", field)))
}

/// Parses an RFC 3339 timestamp; a timestamp without offset is read as UTC.
fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").ok()?;
    debug!(value, "timestamp without offset, assuming UTC");
    Some(naive.and_utc())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    status: Option<String>,
    visibility: Option<String>,
    html_link: Option<String>,
    recurring_event_id: Option<String>,
    attendees: Option<Vec<ApiAttendee>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAttendee {
    email: Option<String>,
    #[serde(rename = "self")]
    is_self: Option<bool>,
    response_status: Option<String>,
}
