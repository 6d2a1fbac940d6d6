//! Spotify Web API connector
//!
//! Implements [`PlaylistSource`] on top of an injected [`HttpClient`]. Each
//! call makes exactly one API request (plus a token request when the cached
//! token is stale); failures are returned, never retried.

use async_trait::async_trait;
use bridge_traits::catalog::{PlaylistSource, RemotePlaylist, TrackPage};
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::time::Clock;
use core_runtime::config::CatalogCredentials;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::SpotifyError;
use crate::token::ClientCredentialsAuth;
use crate::types::{PlaylistObject, PlaylistTracksPage};

/// Spotify Web API base URL
pub const DEFAULT_API_BASE: &str = "https://api.spotify.com/v1";

/// Maximum tracks per page (Spotify API limit)
const TRACKS_PAGE_SIZE: u32 = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Spotify Web API connector
///
/// The pagination cursor handed back in [`TrackPage::next_cursor`] is the
/// `next` url Spotify returns. Cursors pointing anywhere other than the
/// configured API base are rejected so the bearer token never leaves it.
///
/// # Example
///
/// ```ignore
/// use provider_spotify::SpotifyConnector;
/// use bridge_traits::catalog::PlaylistSource;
///
/// let connector = SpotifyConnector::new(http_client, credentials);
/// let meta = connector.fetch_metadata("37i9dQZF1DXcBWIGoYBM5M").await?;
/// ```
pub struct SpotifyConnector {
    http_client: Arc<dyn HttpClient>,
    auth: ClientCredentialsAuth,
    api_base: String,
}

impl SpotifyConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, credentials: CatalogCredentials) -> Self {
        let auth = ClientCredentialsAuth::new(Arc::clone(&http_client), credentials);
        Self {
            http_client,
            auth,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the connector at a different API host (e.g. a local stub)
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.auth = self.auth.with_token_url(url);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.auth = self.auth.with_clock(clock);
        self
    }

    fn first_tracks_url(&self, playlist_id: &str) -> String {
        format!(
            "{}/playlists/{}/tracks?limit={}",
            self.api_base,
            urlencoding::encode(playlist_id),
            TRACKS_PAGE_SIZE
        )
    }

    /// Resolve a cursor into a request url under the API base
    fn cursor_url(&self, cursor: &str) -> std::result::Result<String, SpotifyError> {
        if cursor.starts_with(&format!("{}/", self.api_base)) {
            Ok(cursor.to_string())
        } else if cursor.starts_with('/') {
            Ok(format!("{}{}", self.api_base, cursor))
        } else {
            Err(SpotifyError::ParseError(format!(
                "Unexpected pagination cursor: {}",
                cursor
            )))
        }
    }

    /// Authenticated GET, decoding a successful JSON body
    #[instrument(skip(self, url), fields(url = %url))]
    async fn get_json<T: DeserializeOwned>(&self, url: String) -> std::result::Result<T, SpotifyError> {
        let token = self.auth.access_token().await?;

        let request = HttpRequest::new(HttpMethod::Get, url)
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT);

        let response: HttpResponse = self.http_client.execute(request).await?;

        if !response.is_success() {
            warn!(status = response.status, "Spotify API request failed");
            if response.status == 401 {
                // Revoked or expired early; next call fetches a new token.
                self.auth.invalidate().await;
            }
            return Err(SpotifyError::ApiError {
                status: response.status,
                message: response.text_lossy(),
            });
        }

        debug!(status = response.status, "Spotify API request succeeded");
        response
            .json()
            .map_err(|e| SpotifyError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl PlaylistSource for SpotifyConnector {
    #[instrument(skip(self))]
    async fn fetch_metadata(&self, playlist_id: &str) -> Result<RemotePlaylist> {
        let url = format!(
            "{}/playlists/{}",
            self.api_base,
            urlencoding::encode(playlist_id)
        );
        let playlist: PlaylistObject = self.get_json(url).await?;
        let remote = RemotePlaylist::from(playlist);

        info!(
            name = %remote.name,
            tracks_total = remote.tracks_total,
            "Fetched playlist metadata"
        );
        Ok(remote)
    }

    #[instrument(skip(self))]
    async fn fetch_tracks_page(
        &self,
        playlist_id: &str,
        cursor: Option<String>,
    ) -> Result<TrackPage> {
        let url = match cursor {
            Some(cursor) => self.cursor_url(&cursor)?,
            None => self.first_tracks_url(playlist_id),
        };

        let page: PlaylistTracksPage = self.get_json(url).await?;
        let next_cursor = page.next.clone();
        let items = page.into_tracks();

        debug!(
            count = items.len(),
            has_next = next_cursor.is_some(),
            "Fetched tracks page"
        );

        Ok(TrackPage { items, next_cursor })
    }
}
