//! Playlist mirror workspace crate.
//!
//! Exposes the service layer behind the `desktop-shims` feature so hosts can
//! depend on `playlist-mirror` alone, and ships the `playlist-mirror` daemon.

pub use core_runtime as runtime;

#[cfg(feature = "desktop-shims")]
pub use core_service as service;
