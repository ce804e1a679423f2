//! Bearer token lookup.

use std::collections::HashMap;

use capsync_providers::BoxFuture;

use crate::error::AuthError;

/// Supplies a bearer token for a user.
pub trait TokenProvider: Send + Sync {
    fn token<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<String, AuthError>>;
}

/// Fixed user-to-token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, String>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, user_id: impl Into<String>, token: impl Into<String>) -> Self {
        self.tokens.insert(user_id.into(), token.into());
        self
    }
}

impl TokenProvider for StaticTokenProvider {
    fn token<'a>(&'a self, user_id: &'a str) -> BoxFuture<'a, Result<String, AuthError>> {
        Box::pin(async move {
            self.tokens
                .get(user_id)
                .filter(|token| !token.trim().is_empty())
                .cloned()
                .ok_or(AuthError::MissingToken)
        })
    }
}
