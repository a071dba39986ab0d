//! Firebase Authentication ID token verification.
//!
//! ID tokens are RS256 JWTs signed with rotating Google keys published as a
//! JWK set. A token is accepted when its signature checks out against the key
//! named by its `kid`, it has not expired, its audience is the project id and
//! its issuer is `https://securetoken.google.com/<project id>`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose;
use base64::Engine;
use bookcourier_kernel::settings::AuthSettings;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::token::{AuthError, TokenVerifier, VerifiedToken};

const ISSUER_PREFIX: &str = "https://securetoken.google.com/";

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceAccount {
    project_id: String,
}

/// Extract the project id from base64-encoded service-account JSON.
pub fn project_id_from_service_key(encoded: &str) -> Result<String, AuthError> {
    let raw = general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| AuthError::Config(format!("service key is not valid base64: {}", e)))?;

    let account: ServiceAccount = serde_json::from_slice(&raw)
        .map_err(|e| AuthError::Config(format!("service key is not service-account JSON: {}", e)))?;

    Ok(account.project_id)
}

enum KeySource {
    Remote { client: reqwest::Client, url: String },
    Fixed,
}

struct CachedKeys {
    set: JwkSet,
    fetched_at: Instant,
}

/// Verifies Firebase ID tokens and yields the caller's email.
pub struct FirebaseVerifier {
    project_id: String,
    issuer: String,
    source: KeySource,
    ttl: Duration,
    cache: RwLock<Option<CachedKeys>>,
}

impl FirebaseVerifier {
    /// Verifier that downloads signing keys from `jwks_url` and keeps them
    /// for `ttl`.
    pub fn new(project_id: impl Into<String>, jwks_url: impl Into<String>, ttl: Duration) -> Self {
        let project_id = project_id.into();
        Self {
            issuer: format!("{}{}", ISSUER_PREFIX, project_id),
            project_id,
            source: KeySource::Remote {
                client: reqwest::Client::new(),
                url: jwks_url.into(),
            },
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Verifier pinned to a fixed key set. Keys are never refreshed.
    pub fn with_keys(project_id: impl Into<String>, keys: JwkSet) -> Self {
        let project_id = project_id.into();
        Self {
            issuer: format!("{}{}", ISSUER_PREFIX, project_id),
            project_id,
            source: KeySource::Fixed,
            ttl: Duration::MAX,
            cache: RwLock::new(Some(CachedKeys {
                set: keys,
                fetched_at: Instant::now(),
            })),
        }
    }

    /// Build a verifier from configuration. An explicit `project_id` wins
    /// over the one embedded in `service_key`.
    pub fn from_settings(settings: &AuthSettings) -> Result<Self, AuthError> {
        let project_id = match (&settings.project_id, &settings.service_key) {
            (Some(project_id), _) if !project_id.is_empty() => project_id.clone(),
            (_, Some(service_key)) if !service_key.is_empty() => {
                project_id_from_service_key(service_key)?
            }
            _ => {
                return Err(AuthError::Config(
                    "set auth.project_id or auth.service_key".to_string(),
                ))
            }
        };

        tracing::info!(
            target: "bookcourier-authz",
            project_id = %project_id,
            jwks_url = %settings.jwks_url,
            "firebase token verification configured"
        );

        Ok(Self::new(
            project_id,
            settings.jwks_url.clone(),
            Duration::from_secs(settings.key_ttl_secs),
        ))
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    async fn cached_key(&self, kid: &str) -> Option<Jwk> {
        let cache = self.cache.read().await;
        cache
            .as_ref()
            .filter(|keys| keys.fetched_at.elapsed() < self.ttl)
            .and_then(|keys| keys.set.find(kid))
            .cloned()
    }

    async fn key_for(&self, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        let KeySource::Remote { client, url } = &self.source else {
            return Err(AuthError::InvalidToken(format!("unknown key id '{}'", kid)));
        };

        let set: JwkSet = client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::KeysUnavailable(e.to_string()))?;

        tracing::debug!(
            target: "bookcourier-authz",
            keys = set.keys.len(),
            "refreshed signing keys"
        );

        let key = set.find(kid).cloned();
        *self.cache.write().await = Some(CachedKeys {
            set,
            fetched_at: Instant::now(),
        });

        key.ok_or_else(|| AuthError::InvalidToken(format!("unknown key id '{}'", kid)))
    }
}

#[async_trait]
impl TokenVerifier for FirebaseVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::InvalidToken(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("token has no key id".to_string()))?;

        let jwk = self.key_for(&kid).await?;
        let key = DecodingKey::from_jwk(&jwk).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<IdTokenClaims>(token, &key, &validation)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?
            .claims;

        if claims.sub.is_empty() {
            return Err(AuthError::InvalidToken("token has an empty subject".to_string()));
        }
        let email = claims
            .email
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AuthError::InvalidToken("token carries no email claim".to_string()))?;

        Ok(VerifiedToken {
            subject: claims.sub,
            email,
        })
    }
}
