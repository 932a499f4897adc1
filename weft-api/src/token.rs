//! Bearer token cache.
//!
//! The cached token is reused until `now >= expiry`; there is no early
//! refresh margin. Expiry is read from the JWT `exp` claim when the token
//! decodes, otherwise the expiry the credential reported is used.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::ApiError;

/// OAuth scope for the management API.
pub const API_SCOPE: &str = "https://api.fabric.microsoft.com/.default";

/// A token as handed out by a credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Opaque capability that can produce bearer tokens.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, ApiError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Single-writer / multi-reader token cache in front of a [`TokenCredential`].
pub struct TokenCache {
    credential: Arc<dyn TokenCredential>,
    scope: String,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(credential: Arc<dyn TokenCredential>) -> Self {
        Self::with_scope(credential, API_SCOPE)
    }

    pub fn with_scope(credential: Arc<dyn TokenCredential>, scope: impl Into<String>) -> Self {
        Self {
            credential,
            scope: scope.into(),
            cached: RwLock::new(None),
        }
    }

    /// Cached token while unexpired, otherwise a freshly acquired one.
    pub async fn get_token(&self) -> Result<String, ApiError> {
        {
            let cache = self.cached.read().await;
            if let Some(token) = cache.as_ref() {
                if !token.is_expired(Utc::now()) {
                    return Ok(token.token.clone());
                }
            }
        }
        self.refresh().await
    }

    /// Acquire a new token unconditionally and cache it.
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let mut cache = self.cached.write().await;
        let acquired = self.credential.get_token(&self.scope).await?;
        let claims = decode_claims(&acquired.token);

        let expires_at = claims
            .as_ref()
            .and_then(|c| c.get("exp"))
            .and_then(Value::as_i64)
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
            .unwrap_or(acquired.expires_at);

        if let Some(identity) = claims.as_ref().and_then(executing_identity) {
            info!("Executing as {identity}");
        }
        debug!("access token expires at {}", expires_at.format("%Y-%m-%d %H:%M:%S UTC"));

        *cache = Some(CachedToken {
            token: acquired.token.clone(),
            expires_at,
        });
        Ok(acquired.token)
    }

    /// Expiry of the cached token, if any.
    pub async fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.cached.read().await.as_ref().map(|t| t.expires_at)
    }
}

/// Payload claims of a JWT, or `None` when the token is not a decodable JWT.
pub fn decode_claims(token: &str) -> Option<Map<String, Value>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn executing_identity(claims: &Map<String, Value>) -> Option<String> {
    let claim = |name: &str| claims.get(name).and_then(Value::as_str).map(str::to_string);
    if let Some(upn) = claim("upn") {
        return Some(format!("User '{upn}'"));
    }
    if let Some(appid) = claim("appid") {
        return Some(format!("Application Id '{appid}'"));
    }
    claim("oid").map(|oid| format!("Object Id '{oid}'"))
}
