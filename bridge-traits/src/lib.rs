//! # Host Bridge Traits
//!
//! Capability traits the mirror core consumes but never implements itself.
//!
//! ## Overview
//!
//! This crate defines the contract between the synchronization core and the
//! collaborators that live outside it: the remote playlist catalog, the local
//! filesystem, the external download tool, and the host logging pipeline.
//! Each trait is deliberately narrow so that tests can substitute fakes and
//! hosts can inject their own adapters.
//!
//! ## Traits
//!
//! ### Remote catalog
//! - [`PlaylistSource`](catalog::PlaylistSource) - Playlist metadata and paginated track listing
//! - [`HttpClient`](http::HttpClient) - Async HTTP used by catalog connectors
//!
//! ### Local mirror
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Directory listing and creation
//! - [`ProcessLauncher`](process::ProcessLauncher) - Spawns the download tool and reports its output and exit
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Default Implementations
//!
//! | Capability        | Crate              |
//! |-------------------|--------------------|
//! | `HttpClient`      | `bridge-desktop`   |
//! | `FileSystemAccess`| `bridge-desktop`   |
//! | `ProcessLauncher` | `bridge-desktop`   |
//! | `PlaylistSource`  | `provider-spotify` |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert their own errors into it with an actionable message, since
//! the message is what ends up recorded on the affected playlist.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so that a single adapter instance
//! can be shared by every playlist task.

pub mod catalog;
pub mod error;
pub mod http;
pub mod process;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use catalog::{PlaylistSource, RemoteImage, RemotePlaylist, RemoteTrack, TrackPage};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use process::{
    OutputLine, OutputStream, ProcessCommand, ProcessExit, ProcessHandle, ProcessLauncher,
    ProcessReporter,
};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, ConsoleLogger, FixedClock, LogEntry, LogLevel, LoggerSink, SystemClock};
