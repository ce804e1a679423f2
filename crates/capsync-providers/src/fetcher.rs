//! Google Calendar fetcher.
//!
//! Builds Calendar API v3 requests, sends them through a [`Transport`] and
//! turns non-success responses into [`ProviderError`]s carrying the upstream
//! status. Each request is a single attempt; retries belong to the caller.

use std::collections::HashSet;
use std::sync::Arc;

use capsync_core::SyncWindow;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::raw_event::{CalendarMeta, RawEvent};
use crate::transport::{Transport, TransportError, TransportRequest};

/// Page size requested from the events endpoint (the API maximum).
pub const MAX_RESULTS_PER_PAGE: usize = 2500;

/// Upper bound on pages followed for one listing.
pub const MAX_PAGES: usize = 1000;

/// Provider name attached to errors.
const PROVIDER: &str = "google";

/// Fetches calendars and events for one bearer token at a time.
#[derive(Clone)]
pub struct CalendarFetcher {
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for CalendarFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalendarFetcher").finish_non_exhaustive()
    }
}

impl CalendarFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Lists the calendars visible to the token owner.
    pub async fn list_calendars(&self, token: &str) -> ProviderResult<Vec<CalendarMeta>> {
        let mut calendars = Vec::new();
        let mut cursor = PageCursor::new("/users/me/calendarList");

        loop {
            let mut request = TransportRequest::get("/users/me/calendarList", token);
            if let Some(page) = cursor.token() {
                request = request.with_query("pageToken", page);
            }

            let page: CalendarListPage = self.fetch_json(request).await?;
            calendars.extend(page.items.into_iter().map(CalendarMeta::from));

            if !cursor.advance(page.next_page_token)? {
                break;
            }
        }

        debug!(count = calendars.len(), "listed calendars");
        Ok(calendars)
    }

    /// Lists the events of one calendar inside `window`.
    ///
    /// Recurring events are expanded into instances and ordered by start
    /// time. Pages are followed until the provider stops returning a
    /// continuation token. A token that repeats, or more than [`MAX_PAGES`]
    /// pages, is an invalid response.
    pub async fn list_events(
        &self,
        token: &str,
        calendar_id: &str,
        window: &SyncWindow,
    ) -> ProviderResult<Vec<RawEvent>> {
        let path = format!("/calendars/{}/events", urlencoding::encode(calendar_id));
        let mut events = Vec::new();
        let mut cursor = PageCursor::new(&path);

        loop {
            let mut request = TransportRequest::get(path.clone(), token)
                .with_query("timeMin", window.time_min().to_rfc3339())
                .with_query("timeMax", window.time_max().to_rfc3339())
                .with_query("singleEvents", "true")
                .with_query("orderBy", "startTime")
                .with_query("maxResults", MAX_RESULTS_PER_PAGE.to_string());
            if let Some(page) = cursor.token() {
                request = request.with_query("pageToken", page);
            }

            let page: EventPage = self.fetch_json(request).await?;
            events.extend(page.items.into_iter().map(RawEvent::new));

            if !cursor.advance(page.next_page_token)? {
                break;
            }
        }

        debug!(
            calendar_id,
            count = events.len(),
            pages = cursor.pages,
            "fetched calendar events"
        );
        Ok(events)
    }

    async fn fetch_json<T: DeserializeOwned>(&self, request: TransportRequest) -> ProviderResult<T> {
        let path = request.path.clone();
        let response = self
            .transport
            .get(request)
            .await
            .map_err(|e| transport_failure(&path, e))?;

        if !response.is_success() {
            let message = error_message(response.status, &response.body);
            warn!(path = %path, status = response.status, %message, "provider request failed");
            return Err(ProviderError::from_status(response.status, message).with_provider(PROVIDER));
        }

        serde_json::from_str(&response.body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse response: {}", e))
                .with_provider(PROVIDER)
                .with_source(e)
        })
    }
}

/// Follows `nextPageToken` and refuses tokens that would loop.
struct PageCursor<'a> {
    path: &'a str,
    current: Option<String>,
    seen: HashSet<String>,
    pages: usize,
}

impl<'a> PageCursor<'a> {
    fn new(path: &'a str) -> Self {
        Self {
            path,
            current: None,
            seen: HashSet::new(),
            pages: 0,
        }
    }

    fn token(&self) -> Option<String> {
        self.current.clone()
    }

    /// Records a fetched page. Returns whether another page follows.
    fn advance(&mut self, next: Option<String>) -> ProviderResult<bool> {
        self.pages += 1;
        let Some(next) = next else {
            return Ok(false);
        };
        if self.pages >= MAX_PAGES || !self.seen.insert(next.clone()) {
            warn!(
                path = %self.path,
                pages = self.pages,
                page_token = %next,
                "pagination did not terminate"
            );
            return Err(
                ProviderError::invalid_response("pagination did not terminate")
                    .with_provider(PROVIDER),
            );
        }
        self.current = Some(next);
        Ok(true)
    }
}

fn transport_failure(path: &str, error: TransportError) -> ProviderError {
    warn!(path, error = %error, "transport failure");
    ProviderError::network(error.to_string())
        .with_provider(PROVIDER)
        .with_source(error)
}

/// Extracts the provider's error message, falling back to the raw body or
/// the bare status.
fn error_message(status: u16, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body)
        && let Some(message) = parsed.error.message.filter(|m| !m.trim().is_empty())
    {
        return message;
    }
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        body.to_string()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPage {
    #[serde(default)]
    items: Vec<serde_json::Value>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListPage {
    #[serde(default)]
    items: Vec<ApiCalendar>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCalendar {
    id: String,
    summary: Option<String>,
    summary_override: Option<String>,
    description: Option<String>,
    time_zone: Option<String>,
    access_role: Option<String>,
    #[serde(default)]
    primary: bool,
}

impl From<ApiCalendar> for CalendarMeta {
    fn from(api: ApiCalendar) -> Self {
        let name = api
            .summary_override
            .or(api.summary)
            .unwrap_or_else(|| api.id.clone());
        Self {
            id: api.id,
            name,
            description: api.description,
            timezone: api.time_zone.unwrap_or_else(|| "UTC".to_string()),
            access_role: api.access_role.unwrap_or_else(|| "reader".to_string()),
            primary: api.primary,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}
