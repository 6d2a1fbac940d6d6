//! # Event Bus System
//!
//! Typed lifecycle events for the playlist mirror, broadcast over
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The synchronization core emits an event whenever a playlist is
//! registered, refreshed or reconciled, and whenever a download job starts
//! or finishes. Hosts subscribe to drive UIs, metrics or notifications
//! without reaching into playlist state.
//!
//! ```text
//! ┌──────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ MetadataSync ├──────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘           │ EventBus  │               └────────────┘
//! ┌──────────────┐   emit    │           │   subscribe   ┌────────────┐
//! │  JobManager  ├──────────>│           ├──────────────>│ Subscriber │
//! └──────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaylistEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playlist(PlaylistEvent::Registered {
//!     playlist_id: "abc".to_string(),
//!     url: "https://open.spotify.com/playlist/abc".to_string(),
//! }))
//! .ok();
//!
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.playlist_id(), "abc");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep receiving.
//! - **`RecvError::Closed`**: every sender is gone, treat as shutdown.
//!
//! Emitting with no subscribers returns `Err`; emitters ignore it.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Playlist(PlaylistEvent),
    Job(JobEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playlist(e) => e.description(),
            CoreEvent::Job(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playlist(PlaylistEvent::RefreshFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Job(JobEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Job(_) => EventSeverity::Info,
            CoreEvent::Playlist(PlaylistEvent::MetadataRefreshed { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }

    /// The playlist this event concerns
    pub fn playlist_id(&self) -> &str {
        match self {
            CoreEvent::Playlist(e) => e.playlist_id(),
            CoreEvent::Job(e) => e.playlist_id(),
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playlist Events
// ============================================================================

/// Events about a playlist's registration and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaylistEvent {
    /// A playlist entered the registry.
    Registered { playlist_id: String, url: String },
    /// Metadata and the full track list were replaced.
    MetadataRefreshed {
        playlist_id: String,
        /// Tracks in the new list
        tracks: u64,
        /// Tracks already present locally after the follow-up reconciliation
        downloaded: u64,
    },
    /// A refresh failed; the previous track list was kept.
    RefreshFailed { playlist_id: String, message: String },
    /// Local files were matched against the track list.
    Reconciled {
        playlist_id: String,
        downloaded: u64,
        tracks_total: u64,
    },
}

impl PlaylistEvent {
    fn description(&self) -> &str {
        match self {
            PlaylistEvent::Registered { .. } => "Playlist registered",
            PlaylistEvent::MetadataRefreshed { .. } => "Playlist metadata refreshed",
            PlaylistEvent::RefreshFailed { .. } => "Playlist refresh failed",
            PlaylistEvent::Reconciled { .. } => "Playlist reconciled with local files",
        }
    }

    fn playlist_id(&self) -> &str {
        match self {
            PlaylistEvent::Registered { playlist_id, .. }
            | PlaylistEvent::MetadataRefreshed { playlist_id, .. }
            | PlaylistEvent::RefreshFailed { playlist_id, .. }
            | PlaylistEvent::Reconciled { playlist_id, .. } => playlist_id,
        }
    }
}

// ============================================================================
// Job Events
// ============================================================================

/// Events about download tool runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum JobEvent {
    /// The download tool was launched.
    Started {
        job_id: String,
        playlist_id: String,
        pid: Option<u32>,
    },
    /// The download tool exited with code 0.
    Completed {
        job_id: String,
        playlist_id: String,
        duration_secs: u64,
    },
    /// The download tool exited unsuccessfully or never started.
    Failed {
        job_id: String,
        playlist_id: String,
        message: String,
    },
}

impl JobEvent {
    fn description(&self) -> &str {
        match self {
            JobEvent::Started { .. } => "Download job started",
            JobEvent::Completed { .. } => "Download job completed",
            JobEvent::Failed { .. } => "Download job failed",
        }
    }

    fn playlist_id(&self) -> &str {
        match self {
            JobEvent::Started { playlist_id, .. }
            | JobEvent::Completed { playlist_id, .. }
            | JobEvent::Failed { playlist_id, .. } => playlist_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel. Cheap to clone; clones share the channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event; returns the number of subscribers reached.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Subscribe to future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let jobs_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Job(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from `recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Restrict the stream to one playlist
    pub fn for_playlist(self, playlist_id: impl Into<String>) -> Self {
        let playlist_id = playlist_id.into();
        self.filter(move |event| event.playlist_id() == playlist_id)
    }

    /// Receives the next event that passes the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            match &self.filter {
                Some(filter) if !filter(&event) => continue,
                _ => return Ok(event),
            }
        }
    }

    /// Non-blocking receive; `None` if nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => match &self.filter {
                    Some(filter) if !filter(&event) => continue,
                    _ => return Some(Ok(event)),
                },
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
