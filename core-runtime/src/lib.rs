//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the culler core:
//! - Logging and tracing infrastructure
//! - Configuration management (`CoreConfig`, `SyncConfig`, `CacheConfig`)
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the service crates depend on.
//! It establishes the logging conventions and the single configuration
//! object every service instance is built from.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CacheConfig, CoreConfig, CoreConfigBuilder, SyncConfig};
pub use error::{Error, Result};
