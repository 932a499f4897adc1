//! Concrete [`TokenCredential`] implementations.
//!
//! - [`StaticTokenCredential`]: a pre-issued bearer token (`WEFT_ACCESS_TOKEN`)
//! - [`ClientSecretCredential`]: OAuth2 client-credentials flow against the
//!   Entra token endpoint (`WEFT_TENANT_ID`, `WEFT_CLIENT_ID`,
//!   `WEFT_CLIENT_SECRET`)

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::ApiError;
use crate::token::{AccessToken, TokenCredential};

pub const ENV_ACCESS_TOKEN: &str = "WEFT_ACCESS_TOKEN";
pub const ENV_TENANT_ID: &str = "WEFT_TENANT_ID";
pub const ENV_CLIENT_ID: &str = "WEFT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "WEFT_CLIENT_SECRET";

const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";

/// Hands out the same token every time. Expiry comes from the JWT itself;
/// the reported fallback is one hour from acquisition.
#[derive(Debug, Clone)]
pub struct StaticTokenCredential {
    token: String,
}

impl StaticTokenCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenCredential for StaticTokenCredential {
    async fn get_token(&self, _scope: &str) -> Result<AccessToken, ApiError> {
        Ok(AccessToken {
            token: self.token.clone(),
            expires_at: Utc::now() + Duration::hours(1),
        })
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Client-credentials grant.
#[derive(Debug, Clone)]
pub struct ClientSecretCredential {
    tenant_id: String,
    client_id: String,
    client_secret: String,
    authority: String,
    http: reqwest::Client,
}

impl ClientSecretCredential {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority: DEFAULT_AUTHORITY.to_string(),
            http: reqwest::Client::new(),
        }
    }

    /// Override the login host (sovereign clouds, tests).
    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into().trim_end_matches('/').to_string();
        self
    }

    fn token_url(&self) -> String {
        format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id)
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, ApiError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .http
            .post(self.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| ApiError::Auth(format!("token request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Auth(format!(
                "token request failed with status {status}: {body}"
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Auth(format!("failed to parse token response: {e}")))?;
        debug!("acquired client-credentials token for {}", self.client_id);

        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: Utc::now() + Duration::seconds(parsed.expires_in),
        })
    }
}

/// Pick a credential from the process environment.
pub fn credential_from_env() -> Result<Arc<dyn TokenCredential>, ApiError> {
    credential_from_lookup(|name| std::env::var(name).ok())
}

fn credential_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn TokenCredential>, ApiError> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(token) = get(ENV_ACCESS_TOKEN) {
        return Ok(Arc::new(StaticTokenCredential::new(token)));
    }
    match (get(ENV_TENANT_ID), get(ENV_CLIENT_ID), get(ENV_CLIENT_SECRET)) {
        (Some(tenant), Some(client), Some(secret)) => {
            Ok(Arc::new(ClientSecretCredential::new(tenant, client, secret)))
        }
        _ => Err(ApiError::Auth(format!(
            "no credential configured: set {ENV_ACCESS_TOKEN}, or {ENV_TENANT_ID}, {ENV_CLIENT_ID} and {ENV_CLIENT_SECRET}"
        ))),
    }
}
