//! # Spotify Provider
//!
//! Implements [`PlaylistSource`](bridge_traits::catalog::PlaylistSource) for
//! the Spotify Web API.
//!
//! ## Overview
//!
//! This module provides:
//! - Client-credentials authentication with an in-memory token cache
//! - Playlist metadata lookup
//! - Cursor pagination over a playlist's tracks (100 per page)
//! - Extraction of playlist ids from urls, uris and bare ids

pub mod connector;
pub mod error;
pub mod token;
pub mod types;

pub use connector::SpotifyConnector;
pub use error::{Result, SpotifyError};
pub use token::ClientCredentialsAuth;

/// Extract a playlist id from a `spotify:playlist:<id>` uri, an
/// `https://open.spotify.com/playlist/<id>?...` url, or a bare id.
///
/// Returns `None` for blank input. Input matching neither pattern is
/// returned trimmed and otherwise unchanged.
pub fn extract_playlist_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    for marker in ["spotify:playlist:", "playlist/"] {
        if let Some(id) = id_after(input, marker) {
            return Some(id);
        }
    }

    Some(input.to_string())
}

fn id_after(input: &str, marker: &str) -> Option<String> {
    let start = input.find(marker)? + marker.len();
    let id: String = input[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    (!id.is_empty()).then_some(id)
}
