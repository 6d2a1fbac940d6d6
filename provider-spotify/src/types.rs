//! Spotify Web API response types
//!
//! Only the fields the mirror reads are declared; everything else in the
//! responses is ignored. Spotify returns `null` for many of these, hence the
//! liberal `Option`s and `#[serde(default)]`s.

use bridge_traits::catalog::{RemoteImage, RemotePlaylist, RemoteTrack};
use serde::Deserialize;

/// `POST /api/token` response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageObject {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerObject {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TracksRef {
    #[serde(default)]
    pub total: u64,
}

/// `GET /playlists/{id}` response
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistObject {
    pub name: Option<String>,
    pub description: Option<String>,
    pub owner: Option<OwnerObject>,
    pub tracks: Option<TracksRef>,
    pub external_urls: Option<ExternalUrls>,
    pub images: Option<Vec<ImageObject>>,
}

impl PlaylistObject {
    /// Owner display name, then owner id, then `"Unknown"`
    fn owner_label(&self) -> String {
        self.owner
            .as_ref()
            .and_then(|o| {
                non_empty(o.display_name.as_deref()).or_else(|| non_empty(o.id.as_deref()))
            })
            .unwrap_or("Unknown")
            .to_string()
    }
}

impl From<PlaylistObject> for RemotePlaylist {
    fn from(playlist: PlaylistObject) -> Self {
        let owner = playlist.owner_label();
        RemotePlaylist {
            owner,
            name: playlist.name.unwrap_or_default(),
            description: playlist.description.unwrap_or_default(),
            tracks_total: playlist.tracks.map(|t| t.total).unwrap_or(0),
            url: playlist
                .external_urls
                .and_then(|u| u.spotify)
                .unwrap_or_default(),
            images: playlist
                .images
                .unwrap_or_default()
                .into_iter()
                .map(|i| RemoteImage {
                    url: i.url,
                    width: i.width,
                    height: i.height,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArtistObject {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumObject {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackObject {
    /// `null` for local files added to a playlist
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistObject>,
    pub album: Option<AlbumObject>,
    pub external_urls: Option<ExternalUrls>,
    pub duration_ms: Option<u64>,
}

impl From<TrackObject> for RemoteTrack {
    fn from(track: TrackObject) -> Self {
        RemoteTrack {
            id: track.id.unwrap_or_default(),
            name: track.name,
            artists: track.artists.into_iter().map(|a| a.name).collect(),
            album: track.album.and_then(|a| a.name).unwrap_or_default(),
            external_url: track.external_urls.and_then(|u| u.spotify),
            duration_ms: track.duration_ms.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTrackItem {
    /// `null` when the track is no longer available
    pub track: Option<TrackObject>,
}

/// `GET /playlists/{id}/tracks` response
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistTracksPage {
    #[serde(default)]
    pub items: Vec<PlaylistTrackItem>,
    /// Absolute url of the next page
    pub next: Option<String>,
}

impl PlaylistTracksPage {
    /// Tracks on this page, skipping items without a track payload
    pub fn into_tracks(self) -> Vec<RemoteTrack> {
        self.items
            .into_iter()
            .filter_map(|item| item.track)
            .map(RemoteTrack::from)
            .collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse<T: serde::de::DeserializeOwned>(json: &str) -> T {
        bridge_traits::http::HttpResponse {
            status: 200,
            headers: Default::default(),
            body: bytes::Bytes::from(json.to_string()),
        }
        .json()
        .unwrap()
    }

    #[test]
    fn test_playlist_conversion() {
        let playlist: PlaylistObject = parse(
            r#"{
                "id": "abc",
                "name": "Road Trip",
                "description": "Songs for the car",
                "owner": {"id": "user1", "display_name": "Alex"},
                "tracks": {"total": 42},
                "external_urls": {"spotify": "https://open.spotify.com/playlist/abc"},
                "images": [{"url": "https://i.scdn.co/image/1", "width": 640, "height": 640}]
            }"#,
        );

        let remote = RemotePlaylist::from(playlist);
        assert_eq!(remote.name, "Road Trip");
        assert_eq!(remote.owner, "Alex");
        assert_eq!(remote.description, "Songs for the car");
        assert_eq!(remote.tracks_total, 42);
        assert_eq!(remote.url, "https://open.spotify.com/playlist/abc");
        assert_eq!(remote.images.len(), 1);
        assert_eq!(remote.images[0].width, Some(640));
    }

    #[test]
    fn test_owner_falls_back_to_id_then_unknown() {
        let by_id: PlaylistObject =
            parse(r#"{"name": "x", "owner": {"id": "user1", "display_name": null}}"#);
        assert_eq!(RemotePlaylist::from(by_id).owner, "user1");

        let unknown: PlaylistObject = parse(r#"{"name": "x", "owner": null, "images": null}"#);
        let remote = RemotePlaylist::from(unknown);
        assert_eq!(remote.owner, "Unknown");
        assert_eq!(remote.tracks_total, 0);
        assert!(remote.url.is_empty());
        assert!(remote.images.is_empty());
    }

    #[test]
    fn test_tracks_page_skips_null_tracks() {
        let page: PlaylistTracksPage = parse(
            r#"{
                "items": [
                    {"track": {
                        "id": "t1",
                        "name": "bad guy",
                        "artists": [{"name": "Billie Eilish"}],
                        "album": {"name": "WHEN WE ALL FALL ASLEEP"},
                        "external_urls": {"spotify": "https://open.spotify.com/track/t1"},
                        "duration_ms": 194087
                    }},
                    {"track": null},
                    {"track": {"id": null, "name": "Local File", "artists": [], "album": null}}
                ],
                "next": "https://api.spotify.com/v1/playlists/abc/tracks?offset=100&limit=100"
            }"#,
        );

        assert!(page.next.is_some());
        let tracks = page.into_tracks();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].artists, vec!["Billie Eilish".to_string()]);
        assert_eq!(tracks[0].album, "WHEN WE ALL FALL ASLEEP");
        assert_eq!(tracks[0].duration_ms, 194087);
        assert_eq!(tracks[1].id, "");
        assert_eq!(tracks[1].album, "");
        assert_eq!(tracks[1].external_url, None);
    }
}
