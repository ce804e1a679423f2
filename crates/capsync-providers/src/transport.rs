//! The transport seam.
//!
//! The fetcher never talks HTTP directly. It hands a [`TransportRequest`] to a
//! [`Transport`] and gets back either a status/body pair or a typed
//! [`TransportError`]. Timeouts are the transport's job.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use thiserror::Error;

/// A boxed future for async trait methods.
///
/// Keeps [`Transport`] object-safe so it can be shared as `Arc<dyn Transport>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// An authenticated GET request against the provider API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    /// Path relative to the API base, e.g. `/users/me/calendarList`.
    pub path: String,
    pub bearer_token: String,
    pub query: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn get(path: impl Into<String>, bearer_token: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            bearer_token: bearer_token.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Returns the first value of a query parameter.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A response that made it back from the provider, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that produced no response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read response body: {0}")]
    Decode(String),
}

/// Performs outbound requests for the fetcher.
pub trait Transport: Send + Sync {
    fn get(&self, request: TransportRequest)
    -> BoxFuture<'_, Result<TransportResponse, TransportError>>;
}

type CannedKey = (String, Option<String>);

/// A transport that replays prepared responses.
///
/// Responses are keyed by path and `pageToken`; each key may be queued
/// several times and is replayed in order, the last one repeating. Unknown
/// keys answer 404. Every request is recorded.
#[derive(Debug, Default)]
pub struct CannedTransport {
    responses: Mutex<HashMap<CannedKey, VecDeque<Result<TransportResponse, TransportError>>>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl CannedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for the first page of `path`.
    pub fn with_response(self, path: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.push((path.into(), None), Ok(TransportResponse::new(status, body)))
    }

    /// Queues a response for a follow-up page of `path`.
    pub fn with_page(
        self,
        path: impl Into<String>,
        page_token: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        self.push(
            (path.into(), Some(page_token.into())),
            Ok(TransportResponse::new(status, body)),
        )
    }

    /// Queues a transport failure for the first page of `path`.
    pub fn with_failure(self, path: impl Into<String>, error: TransportError) -> Self {
        self.push((path.into(), None), Err(error))
    }

    fn push(self, key: CannedKey, response: Result<TransportResponse, TransportError>) -> Self {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(key)
            .or_default()
            .push_back(response);
        self
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn respond(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let key = (
            request.path.clone(),
            request.query_value("pageToken").map(str::to_string),
        );
        let mut responses = self
            .responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match responses.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Ok(TransportResponse::new(404, ""))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(TransportResponse::new(404, ""))),
            None => Ok(TransportResponse::new(404, "")),
        }
    }
}

impl Transport for CannedTransport {
    fn get(
        &self,
        request: TransportRequest,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        let response = self.respond(&request);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        Box::pin(async move { response })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder() {
        let request = TransportRequest::get("/calendars/primary/events", "tok")
            .with_query("singleEvents", "true")
            .with_query("pageToken", "p2");
        assert_eq!(request.query_value("pageToken"), Some("p2"));
        assert_eq!(request.query_value("missing"), None);
    }

    #[test]
    fn success_range() {
        assert!(TransportResponse::new(200, "").is_success());
        assert!(TransportResponse::new(204, "").is_success());
        assert!(!TransportResponse::new(304, "").is_success());
        assert!(!TransportResponse::new(403, "").is_success());
    }

    #[tokio::test]
    async fn canned_transport_replays_in_order() {
        let transport = CannedTransport::new()
            .with_response("/a", 500, "boom")
            .with_response("/a", 200, "ok")
            .with_page("/a", "next", 200, "page two")
            .with_failure("/b", TransportError::Timeout);

        let first = transport.get(TransportRequest::get("/a", "t")).await.unwrap();
        assert_eq!(first.status, 500);
        let second = transport.get(TransportRequest::get("/a", "t")).await.unwrap();
        assert_eq!(second.body, "ok");
        // last response repeats
        let third = transport.get(TransportRequest::get("/a", "t")).await.unwrap();
        assert_eq!(third.body, "ok");

        let paged = transport
            .get(TransportRequest::get("/a", "t").with_query("pageToken", "next"))
            .await
            .unwrap();
        assert_eq!(paged.body, "page two");

        let failed = transport.get(TransportRequest::get("/b", "t")).await;
        assert_eq!(failed, Err(TransportError::Timeout));

        let missing = transport.get(TransportRequest::get("/c", "t")).await.unwrap();
        assert_eq!(missing.status, 404);

        assert_eq!(transport.requests().len(), 6);
    }
}
