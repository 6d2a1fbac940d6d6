//! # Mirror Configuration
//!
//! Settings for the playlist mirror, either assembled with
//! [`MirrorConfig::builder`] or loaded from the process environment with
//! [`MirrorConfig::from_env`].
//!
//! ## Environment
//!
//! | Variable                   | Meaning                                   | Default       |
//! |----------------------------|-------------------------------------------|---------------|
//! | `PLAYLIST_URLS`            | Comma separated playlist urls, uris or ids| empty         |
//! | `DOWNLOAD_ROOT`            | Mirror root directory                     | `./downloads` |
//! | `SPOTDL_CMD`               | Download tool executable                  | `spotdl`      |
//! | `SPOTDL_ARGS`              | Extra whitespace separated tool arguments | none          |
//! | `SPOTIFY_CLIENT_ID`        | Catalog client id                         | unset         |
//! | `SPOTIFY_CLIENT_SECRET`    | Catalog client secret                     | unset         |
//! | `METADATA_REFRESH_MINUTES` | Periodic refresh interval, `0` disables   | `60`          |
//! | `DOWNLOAD_SCAN_SECONDS`    | Periodic reconcile interval, `0` disables | `30`          |
//! | `LOG_CAPACITY`             | Retained output lines per playlist        | `500`         |
//!
//! Missing catalog credentials are not a configuration error. The mirror
//! still starts; every metadata fetch then fails and the failure is recorded
//! on the affected playlist.
//!
//! ## Usage
//!
//! ```no_run
//! use core_runtime::config::MirrorConfig;
//!
//! let config = MirrorConfig::builder()
//!     .download_root("/srv/music")
//!     .playlist_url("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M")
//!     .build()
//!     .expect("valid config");
//! ```

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DOWNLOAD_ROOT: &str = "./downloads";
pub const DEFAULT_DOWNLOADER_PROGRAM: &str = "spotdl";
pub const DEFAULT_METADATA_REFRESH_MINUTES: u64 = 60;
pub const DEFAULT_DOWNLOAD_SCAN_SECONDS: u64 = 30;
pub const DEFAULT_LOG_CAPACITY: usize = 500;

/// File extensions (lower case, without the dot) counted as downloaded audio
pub const DEFAULT_AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "flac", "ogg", "opus", "wav"];

/// Client-credentials pair for the remote catalog
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CatalogCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl CatalogCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
        }
    }

    /// Both halves present and non-empty
    pub fn is_complete(&self) -> bool {
        matches!(
            (&self.client_id, &self.client_secret),
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty()
        )
    }
}

impl std::fmt::Debug for CatalogCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogCredentials")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

/// Runtime configuration for the playlist mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    /// Playlists registered at startup, as given by the operator
    pub playlist_urls: Vec<String>,

    /// Each playlist mirrors into `<download_root>/<playlist id>`
    pub download_root: PathBuf,

    /// Download tool executable
    pub downloader_program: String,

    /// Arguments appended after the playlist url
    pub downloader_args: Vec<String>,

    pub credentials: CatalogCredentials,

    /// `None` disables periodic metadata refresh
    pub metadata_refresh_interval: Option<Duration>,

    /// `None` disables periodic reconciliation of download directories
    pub download_scan_interval: Option<Duration>,

    /// Maximum retained download-tool output lines per playlist
    pub log_capacity: usize,

    /// Lower-case extensions counted as audio files
    pub audio_extensions: Vec<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            playlist_urls: Vec::new(),
            download_root: PathBuf::from(DEFAULT_DOWNLOAD_ROOT),
            downloader_program: DEFAULT_DOWNLOADER_PROGRAM.to_string(),
            downloader_args: Vec::new(),
            credentials: CatalogCredentials::default(),
            metadata_refresh_interval: Some(Duration::from_secs(
                DEFAULT_METADATA_REFRESH_MINUTES * 60,
            )),
            download_scan_interval: Some(Duration::from_secs(DEFAULT_DOWNLOAD_SCAN_SECONDS)),
            log_capacity: DEFAULT_LOG_CAPACITY,
            audio_extensions: DEFAULT_AUDIO_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }
}

impl MirrorConfig {
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut builder = MirrorConfig::builder();

        if let Some(urls) = get("PLAYLIST_URLS") {
            builder = builder.playlist_urls(split_list(&urls));
        }
        if let Some(root) = get("DOWNLOAD_ROOT") {
            builder = builder.download_root(root);
        }
        if let Some(program) = get("SPOTDL_CMD") {
            builder = builder.downloader_program(program);
        }
        if let Some(args) = get("SPOTDL_ARGS") {
            builder = builder.downloader_args(args.split_whitespace().map(str::to_string));
        }
        if let Some(id) = get("SPOTIFY_CLIENT_ID") {
            builder = builder.client_id(id);
        }
        if let Some(secret) = get("SPOTIFY_CLIENT_SECRET") {
            builder = builder.client_secret(secret);
        }
        if let Some(minutes) = get("METADATA_REFRESH_MINUTES") {
            let minutes = parse_number::<u64>("METADATA_REFRESH_MINUTES", &minutes)?;
            builder = builder.metadata_refresh_interval(
                (minutes > 0).then(|| Duration::from_secs(minutes * 60)),
            );
        }
        if let Some(seconds) = get("DOWNLOAD_SCAN_SECONDS") {
            let seconds = parse_number::<u64>("DOWNLOAD_SCAN_SECONDS", &seconds)?;
            builder =
                builder.download_scan_interval((seconds > 0).then(|| Duration::from_secs(seconds)));
        }
        if let Some(capacity) = get("LOG_CAPACITY") {
            builder = builder.log_capacity(parse_number::<usize>("LOG_CAPACITY", &capacity)?);
        }

        builder.build()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.download_root.as_os_str().is_empty() {
            return Err(Error::Config("Download root cannot be empty".to_string()));
        }

        if self.downloader_program.trim().is_empty() {
            return Err(Error::Config(
                "Download tool executable cannot be empty".to_string(),
            ));
        }

        if self.log_capacity == 0 {
            return Err(Error::Config(
                "Log capacity must be greater than 0".to_string(),
            ));
        }

        if self.audio_extensions.is_empty() {
            return Err(Error::Config(
                "At least one audio extension is required".to_string(),
            ));
        }

        if let Some(ext) = self
            .audio_extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.') || ext.to_lowercase() != **ext)
        {
            return Err(Error::Config(format!(
                "Audio extension '{}' must be lower case without a leading dot",
                ext
            )));
        }

        if matches!(self.metadata_refresh_interval, Some(d) if d.is_zero())
            || matches!(self.download_scan_interval, Some(d) if d.is_zero())
        {
            return Err(Error::Config(
                "Periodic intervals must be non-zero; use None to disable".to_string(),
            ));
        }

        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>().map_err(|_| {
        Error::Config(format!(
            "{} must be a non-negative integer, got '{}'",
            key, raw
        ))
    })
}

/// Builder for [`MirrorConfig`].
///
/// Unset fields take the defaults listed in the module docs.
#[derive(Debug, Default)]
pub struct MirrorConfigBuilder {
    playlist_urls: Vec<String>,
    download_root: Option<PathBuf>,
    downloader_program: Option<String>,
    downloader_args: Vec<String>,
    credentials: CatalogCredentials,
    metadata_refresh_interval: Option<Option<Duration>>,
    download_scan_interval: Option<Option<Duration>>,
    log_capacity: Option<usize>,
    audio_extensions: Option<Vec<String>>,
}

impl MirrorConfigBuilder {
    pub fn playlist_url(mut self, url: impl Into<String>) -> Self {
        self.playlist_urls.push(url.into());
        self
    }

    pub fn playlist_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.playlist_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn download_root<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.download_root = Some(path.into());
        self
    }

    pub fn downloader_program(mut self, program: impl Into<String>) -> Self {
        self.downloader_program = Some(program.into());
        self
    }

    pub fn downloader_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.downloader_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.credentials.client_id = Some(id.into());
        self
    }

    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.credentials.client_secret = Some(secret.into());
        self
    }

    /// `None` disables periodic refresh
    pub fn metadata_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.metadata_refresh_interval = Some(interval);
        self
    }

    /// `None` disables periodic reconciliation
    pub fn download_scan_interval(mut self, interval: Option<Duration>) -> Self {
        self.download_scan_interval = Some(interval);
        self
    }

    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = Some(capacity);
        self
    }

    pub fn audio_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audio_extensions = Some(extensions.into_iter().map(Into::into).collect());
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<MirrorConfig> {
        let defaults = MirrorConfig::default();
        let config = MirrorConfig {
            playlist_urls: self.playlist_urls,
            download_root: self.download_root.unwrap_or(defaults.download_root),
            downloader_program: self
                .downloader_program
                .unwrap_or(defaults.downloader_program),
            downloader_args: self.downloader_args,
            credentials: self.credentials,
            metadata_refresh_interval: self
                .metadata_refresh_interval
                .unwrap_or(defaults.metadata_refresh_interval),
            download_scan_interval: self
                .download_scan_interval
                .unwrap_or(defaults.download_scan_interval),
            log_capacity: self.log_capacity.unwrap_or(defaults.log_capacity),
            audio_extensions: self.audio_extensions.unwrap_or(defaults.audio_extensions),
        };

        config.validate()?;
        Ok(config)
    }
}
