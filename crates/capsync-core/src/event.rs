//! Canonical event types.
//!
//! [`Event`] is what every sync run produces for the capacity model. It is
//! built once per run by the normalizer and never mutated afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::time::EventTime;

/// The capacity category an event falls into.
///
/// Variants are declared in classification precedence order; `Meeting` is the
/// fallback and always comes last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Holiday,
    Pto,
    Travel,
    Focus,
    Training,
    Meeting,
}

impl EventType {
    /// Types that are matched by keywords, in precedence order.
    pub const CLASSIFIED: [EventType; 5] = [
        EventType::Holiday,
        EventType::Pto,
        EventType::Travel,
        EventType::Focus,
        EventType::Training,
    ];

    /// Returns the wire name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Holiday => "holiday",
            Self::Pto => "pto",
            Self::Travel => "travel",
            Self::Focus => "focus",
            Self::Training => "training",
            Self::Meeting => "meeting",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "holiday" => Ok(Self::Holiday),
            "pto" => Ok(Self::Pto),
            "travel" => Ok(Self::Travel),
            "focus" => Ok(Self::Focus),
            "training" => Ok(Self::Training),
            "meeting" => Ok(Self::Meeting),
            other => Err(format!("unknown event type: {other}")),
        }
    }
}

/// Participation status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
    /// The calendar owner declined the invitation.
    Declined,
}

impl EventStatus {
    /// Maps a provider status string; unknown or missing values are
    /// treated as confirmed.
    pub fn from_provider(status: Option<&str>) -> Self {
        match status.map(str::to_ascii_lowercase).as_deref() {
            Some("tentative") => Self::Tentative,
            Some("cancelled") => Self::Cancelled,
            Some("declined") => Self::Declined,
            _ => Self::Confirmed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Tentative => "tentative",
            Self::Cancelled => "cancelled",
            Self::Declined => "declined",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility used when the provider does not report one.
pub const DEFAULT_VISIBILITY: &str = "default";

/// A normalized calendar event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Provider identifier of the event (or recurring instance).
    pub id: String,
    /// The calendar this event was fetched from.
    pub calendar_id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: EventTime,
    pub end_time: EventTime,
    /// True iff the provider start was date-only.
    pub all_day: bool,
    pub status: EventStatus,
    pub event_type: EventType,
    /// Attendee email addresses.
    pub attendees: Vec<String>,
    /// Whether this is an instance of a recurring series.
    pub recurring: bool,
    pub visibility: String,
    /// Link to the event in the provider UI.
    pub external_link: Option<String>,
}

impl Event {
    /// Creates an event with the required fields; `all_day` follows the
    /// form of `start_time`.
    pub fn new(
        id: impl Into<String>,
        calendar_id: impl Into<String>,
        title: impl Into<String>,
        start_time: EventTime,
        end_time: EventTime,
        event_type: EventType,
    ) -> Self {
        let all_day = start_time.is_all_day();
        Self {
            id: id.into(),
            calendar_id: calendar_id.into(),
            title: title.into(),
            description: None,
            location: None,
            start_time,
            end_time,
            all_day,
            status: EventStatus::Confirmed,
            event_type,
            attendees: Vec::new(),
            recurring: false,
            visibility: DEFAULT_VISIBILITY.to_string(),
            external_link: None,
        }
    }

    /// Duration in minutes; all-day spans count from midnight to midnight.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time.to_utc_datetime() - self.start_time.to_utc_datetime()).num_minutes()
    }

    /// Number of days covered by an all-day event (at least one).
    pub fn span_days(&self) -> i64 {
        (self.end_time.date() - self.start_time.date()).num_days().max(1)
    }

    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description;
        self
    }

    pub fn with_location(mut self, location: Option<String>) -> Self {
        self.location = location;
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attendees(mut self, attendees: Vec<String>) -> Self {
        self.attendees = attendees;
        self
    }

    pub fn with_recurring(mut self, recurring: bool) -> Self {
        self.recurring = recurring;
        self
    }

    pub fn with_visibility(mut self, visibility: impl Into<String>) -> Self {
        self.visibility = visibility.into();
        self
    }

    pub fn with_external_link(mut self, link: Option<String>) -> Self {
        self.external_link = link;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn event_type_round_trips_names() {
        for ty in EventType::CLASSIFIED {
            assert_eq!(ty.as_str().parse::<EventType>().unwrap(), ty);
        }
        assert_eq!("Meeting".parse::<EventType>().unwrap(), EventType::Meeting);
        assert!("standup".parse::<EventType>().is_err());
    }

    #[test]
    fn event_type_serializes_snake_case() {
        let json = serde_json::to_string(&EventType::Pto).unwrap();
        assert_eq!(json, "\"pto\"");
    }

    #[test]
    fn provider_status_mapping() {
        assert_eq!(EventStatus::from_provider(None), EventStatus::Confirmed);
        assert_eq!(
            EventStatus::from_provider(Some("tentative")),
            EventStatus::Tentative
        );
        assert_eq!(
            EventStatus::from_provider(Some("cancelled")),
            EventStatus::Cancelled
        );
        assert_eq!(
            EventStatus::from_provider(Some("something-new")),
            EventStatus::Confirmed
        );
    }

    #[test]
    fn all_day_follows_start() {
        let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let event = Event::new(
            "e1",
            "primary",
            "Bank holiday",
            EventTime::from_date(day),
            EventTime::from_date(day.succ_opt().unwrap()),
            EventType::Holiday,
        );
        assert!(event.all_day);
        assert_eq!(event.span_days(), 1);
        assert_eq!(event.duration_minutes(), 24 * 60);
        assert_eq!(event.visibility, DEFAULT_VISIBILITY);
    }

    #[test]
    fn timed_event_duration() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
        let event = Event::new(
            "e2",
            "primary",
            "1:1",
            EventTime::from_utc(start),
            EventTime::from_utc(start + chrono::Duration::minutes(45)),
            EventType::Meeting,
        );
        assert!(!event.all_day);
        assert_eq!(event.duration_minutes(), 45);
    }
}
