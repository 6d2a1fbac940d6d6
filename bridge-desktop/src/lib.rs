//! # Desktop Bridge Implementations
//!
//! Default implementations of the host capabilities for desktop and server
//! hosts (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `FileSystemAccess` using `tokio::fs`
//! - `ProcessLauncher` using `tokio::process`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem, TokioProcessLauncher};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let http_client = ReqwestHttpClient::new()?;
//!     let fs = TokioFileSystem::new();
//!     let launcher = TokioProcessLauncher::new();
//!
//!     // Hand these to the mirror service dependencies
//!     Ok(())
//! }
//! ```

mod filesystem;
mod http;
mod process;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use process::TokioProcessLauncher;
