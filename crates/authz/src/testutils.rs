//! Test doubles for token verification.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::token::{AuthError, TokenVerifier, VerifiedToken};

/// Verifier that accepts a fixed set of opaque tokens.
#[derive(Debug, Default, Clone)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as belonging to `email`.
    pub fn with_token(mut self, token: impl Into<String>, email: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), email.into());
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        self.tokens
            .get(token)
            .map(|email| VerifiedToken {
                subject: format!("uid-{}", email),
                email: email.clone(),
            })
            .ok_or_else(|| AuthError::InvalidToken("unknown token".to_string()))
    }
}
