//! Capacity projection of a set of events.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventType};

/// Time consumed per event type.
///
/// Timed events contribute minutes, all-day events contribute whole days.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityImpact {
    pub busy_minutes: BTreeMap<EventType, i64>,
    pub all_day_days: BTreeMap<EventType, i64>,
    pub event_count: usize,
}

impl CapacityImpact {
    pub fn from_events(events: &[Event]) -> Self {
        let mut impact = Self::default();
        for event in events {
            impact.add(event);
        }
        impact
    }

    fn add(&mut self, event: &Event) {
        self.event_count += 1;
        if event.all_day {
            *self.all_day_days.entry(event.event_type).or_default() += event.span_days();
        } else {
            *self.busy_minutes.entry(event.event_type).or_default() +=
                event.duration_minutes().max(0);
        }
    }

    /// Total minutes across timed events.
    pub fn total_busy_minutes(&self) -> i64 {
        self.busy_minutes.values().sum()
    }

    pub fn minutes_for(&self, event_type: EventType) -> i64 {
        self.busy_minutes.get(&event_type).copied().unwrap_or(0)
    }

    pub fn days_for(&self, event_type: EventType) -> i64 {
        self.all_day_days.get(&event_type).copied().unwrap_or(0)
    }
}
