use async_trait::async_trait;
use thiserror::Error;

const BEARER_PREFIX: &str = "Bearer ";

/// Errors raised while authenticating a caller
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("missing or malformed bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),

    #[error("identity provider misconfigured: {0}")]
    Config(String),
}

/// Identity extracted from a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub email: String,
}

/// Checks bearer tokens against an identity provider.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError>;
}

/// Extract the token from an `Authorization` header value.
///
/// The scheme must be exactly `Bearer` followed by a single space.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let token = header
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .ok_or(AuthError::MissingToken)?;

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }

    Ok(token)
}
