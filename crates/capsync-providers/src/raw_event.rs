//! Provider payloads as they cross the fetch boundary.
//!
//! [`RawEvent`] wraps the provider's JSON object untouched. Only the
//! normalizer looks inside it; everything else passes it along opaquely.

use serde::{Deserialize, Serialize};

/// One event exactly as the provider returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawEvent(serde_json::Value);

impl RawEvent {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for RawEvent {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Description of one calendar the user can read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarMeta {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    /// IANA timezone identifier.
    pub timezone: String,
    /// The caller's role, e.g. `owner`, `reader`, `freeBusyReader`.
    pub access_role: String,
    pub primary: bool,
}
