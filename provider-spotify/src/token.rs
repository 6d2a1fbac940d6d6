//! Client-credentials token acquisition
//!
//! Tokens are cached in memory and reused until 60 seconds before they
//! expire. Concurrent callers share one in-flight request.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Duration, Utc};
use core_runtime::config::CatalogCredentials;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SpotifyError};
use crate::types::TokenResponse;

pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Tokens are treated as expired this long before Spotify says they are
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Client-credentials flow against the Spotify accounts service
pub struct ClientCredentialsAuth {
    http_client: Arc<dyn HttpClient>,
    credentials: CatalogCredentials,
    token_url: String,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentialsAuth {
    pub fn new(http_client: Arc<dyn HttpClient>, credentials: CatalogCredentials) -> Self {
        Self {
            http_client,
            credentials,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            clock: Arc::new(SystemClock),
            cached: Mutex::new(None),
        }
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// A valid access token, fetching a new one when the cache is stale
    #[instrument(skip(self))]
    pub async fn access_token(&self) -> Result<String> {
        let (client_id, client_secret) = match (
            self.credentials.client_id.as_deref(),
            self.credentials.client_secret.as_deref(),
        ) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => (id, secret),
            _ => return Err(SpotifyError::MissingCredentials),
        };

        let mut cached = self.cached.lock().await;
        let now = self.clock.now();

        if let Some(token) = cached.as_ref() {
            if now < token.expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) {
                return Ok(token.value.clone());
            }
        }

        debug!(client_id, "Requesting client-credentials token");

        let basic = STANDARD.encode(format!("{}:{}", client_id, client_secret));
        let request = HttpRequest::new(HttpMethod::Post, &self.token_url)
            .header("Authorization", format!("Basic {}", basic))
            .form(&[("grant_type", "client_credentials")])
            .timeout(std::time::Duration::from_secs(30));

        let response = self.http_client.execute(request).await?;
        if !response.is_success() {
            warn!(status = response.status, "Token request rejected");
            return Err(SpotifyError::TokenRequest {
                status: response.status,
                message: response.text_lossy(),
            });
        }

        let body: TokenResponse = response
            .json()
            .map_err(|e| SpotifyError::ParseError(e.to_string()))?;

        let token = CachedToken {
            value: body.access_token,
            expires_at: now + Duration::seconds(body.expires_in),
        };
        debug!(expires_at = %token.expires_at, "Cached new access token");

        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Drop the cached token so the next call fetches a fresh one
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }
}
