//! Error types for the calendar fetch boundary.
//!
//! [`ProviderError`] describes one failed exchange with a calendar provider
//! and keeps the upstream HTTP status so callers can map it outward.
//! [`MalformedEventError`] describes a single event that could not be
//! normalized.

use std::fmt;

use thiserror::Error;

/// High-level classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Credentials were rejected (401).
    AuthenticationFailed,
    /// The caller may not access the calendar (403).
    AuthorizationFailed,
    /// Connection failure or timeout; no response was received.
    NetworkError,
    /// Too many requests (429).
    RateLimited,
    /// Server-side failure (5xx).
    ServerError,
    /// The response could not be decoded.
    InvalidResponse,
    NotFound,
    BadRequest,
    /// Any other non-success status.
    Unexpected,
}

impl ProviderErrorCode {
    /// Classifies an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 => Self::AuthenticationFailed,
            403 => Self::AuthorizationFailed,
            404 | 410 => Self::NotFound,
            429 => Self::RateLimited,
            500..=599 => Self::ServerError,
            _ => Self::Unexpected,
        }
    }

    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::BadRequest => "bad_request",
            Self::Unexpected => "unexpected_status",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed fetch from a calendar provider.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    /// Upstream HTTP status, absent when no response arrived.
    status_code: Option<u16>,
    message: String,
    provider: Option<String>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            status_code: None,
            message: message.into(),
            provider: None,
            source: None,
        }
    }

    /// Creates an error for a non-success HTTP response.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(ProviderErrorCode::from_status(status), message);
        err.status_code = Some(status);
        err
    }

    /// Creates a network error (timeout, refused connection, ...).
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// The upstream HTTP status, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        match self.status_code {
            Some(status) => write!(f, "{} ({}): {}", self.code, status, self.message),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// A provider event that lacks a required field.
///
/// Raised per event; the event is skipped and the rest of the calendar is
/// still processed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed event {}: {reason}", .event_id.as_deref().unwrap_or("<no id>"))]
pub struct MalformedEventError {
    pub event_id: Option<String>,
    pub reason: String,
}

impl MalformedEventError {
    pub fn new(event_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            event_id,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(
            ProviderErrorCode::from_status(401),
            ProviderErrorCode::AuthenticationFailed
        );
        assert_eq!(
            ProviderErrorCode::from_status(403),
            ProviderErrorCode::AuthorizationFailed
        );
        assert_eq!(
            ProviderErrorCode::from_status(429),
            ProviderErrorCode::RateLimited
        );
        assert_eq!(
            ProviderErrorCode::from_status(503),
            ProviderErrorCode::ServerError
        );
        assert_eq!(
            ProviderErrorCode::from_status(418),
            ProviderErrorCode::Unexpected
        );
    }

    #[test]
    fn retryable_codes() {
        assert!(ProviderErrorCode::NetworkError.is_retryable());
        assert!(ProviderErrorCode::RateLimited.is_retryable());
        assert!(ProviderErrorCode::ServerError.is_retryable());
        assert!(!ProviderErrorCode::AuthenticationFailed.is_retryable());
        assert!(!ProviderErrorCode::NotFound.is_retryable());
    }

    #[test]
    fn status_is_forwarded() {
        let err = ProviderError::from_status(403, "Forbidden").with_provider("google");
        assert_eq!(err.status_code(), Some(403));
        assert_eq!(err.code(), ProviderErrorCode::AuthorizationFailed);
        assert_eq!(err.message(), "Forbidden");
        assert_eq!(err.provider(), Some("google"));
        assert_eq!(
            err.to_string(),
            "[google] authorization_failed (403): Forbidden"
        );
    }

    #[test]
    fn network_error_has_no_status() {
        let err = ProviderError::network("request timeout");
        assert_eq!(err.status_code(), None);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "network_error: request timeout");
    }

    #[test]
    fn source_is_kept() {
        use std::error::Error;
        let io_err = std::io::Error::other("reset by peer");
        let err = ProviderError::network("connection failed").with_source(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn malformed_display() {
        let err = MalformedEventError::new(Some("evt-1".into()), "missing start");
        assert_eq!(err.to_string(), "malformed event evt-1: missing start");
        let err = MalformedEventError::new(None, "missing id");
        assert_eq!(err.to_string(), "malformed event <no id>: missing id");
    }
}
