//! Sync error types.
//!
//! Only errors that abort a whole operation live here. Per-calendar fetch
//! failures are reported inside the sync result instead.

use capsync_core::ConfigError;
use capsync_providers::ProviderError;
use thiserror::Error;

/// No usable credential for the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no bearer token available for user")]
    MissingToken,

    /// The token provider failed to produce a token.
    #[error("token provider failed: {0}")]
    Provider(String),
}

/// Errors that abort a sync operation.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A single-calendar read failed. Multi-calendar runs never return this.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl SyncError {
    /// HTTP status a service layer should answer with.
    ///
    /// Upstream 401/403/404/429 are forwarded so a revoked token reads as
    /// the caller's problem; other provider failures are a bad gateway.
    pub fn external_status(&self) -> u16 {
        match self {
            Self::Auth(_) => 401,
            Self::Config(_) => 400,
            Self::Provider(e) => match e.status_code() {
                Some(status @ (401 | 403 | 404 | 429)) => status,
                _ => 502,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_status_mapping() {
        assert_eq!(SyncError::from(AuthError::MissingToken).external_status(), 401);
        assert_eq!(
            SyncError::from(ConfigError::InvalidWindowDays(0)).external_status(),
            400
        );
        assert_eq!(
            SyncError::from(ProviderError::from_status(401, "bad token")).external_status(),
            401
        );
        assert_eq!(
            SyncError::from(ProviderError::from_status(403, "forbidden")).external_status(),
            403
        );
        assert_eq!(
            SyncError::from(ProviderError::from_status(429, "slow down")).external_status(),
            429
        );
        assert_eq!(
            SyncError::from(ProviderError::from_status(500, "boom")).external_status(),
            502
        );
        assert_eq!(
            SyncError::from(ProviderError::network("request timed out")).external_status(),
            502
        );
    }

    #[test]
    fn display() {
        let err = SyncError::from(AuthError::Provider("vault sealed".into()));
        assert_eq!(
            err.to_string(),
            "authentication error: token provider failed: vault sealed"
        );
    }
}
