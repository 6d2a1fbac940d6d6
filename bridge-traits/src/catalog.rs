//! Remote Playlist Catalog
//!
//! The narrow view of a remote music catalog that the mirror needs:
//! playlist metadata and a cursor-paginated track listing. Connectors own
//! the wire details (authentication, JSON shapes, page sizes).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Cover image reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteImage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Playlist-level metadata as reported by the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub name: String,
    /// Display name of the owner, already resolved by the connector
    pub owner: String,
    pub description: String,
    /// Track count the catalog claims, which may differ from what pagination yields
    pub tracks_total: u64,
    /// Canonical web URL; empty when the catalog did not report one
    pub url: String,
    pub images: Vec<RemoteImage>,
}

/// One track record from a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    pub external_url: Option<String>,
    pub duration_ms: u64,
}

/// A single page of a track listing
#[derive(Debug, Clone, Default)]
pub struct TrackPage {
    pub items: Vec<RemoteTrack>,
    /// Opaque cursor for the following page, `None` on the last page
    pub next_cursor: Option<String>,
}

/// Remote catalog trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::PlaylistSource;
///
/// async fn first_page(source: &dyn PlaylistSource, id: &str) -> Result<usize> {
///     let page = source.fetch_tracks_page(id, None).await?;
///     Ok(page.items.len())
/// }
/// ```
#[async_trait]
pub trait PlaylistSource: Send + Sync {
    /// Fetch playlist-level metadata
    async fn fetch_metadata(&self, playlist_id: &str) -> Result<RemotePlaylist>;

    /// Fetch one page of tracks
    ///
    /// `cursor` is `None` for the first page and otherwise the
    /// `next_cursor` returned by the previous call.
    async fn fetch_tracks_page(
        &self,
        playlist_id: &str,
        cursor: Option<String>,
    ) -> Result<TrackPage>;
}
