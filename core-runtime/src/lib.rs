//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playlist mirror:
//! - Logging and tracing infrastructure
//! - Configuration loading and validation
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the synchronization core and the
//! service layer depend on. It establishes the logging conventions, the
//! environment-driven configuration, and the event broadcasting used to
//! observe playlist and job lifecycles from outside the core.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
