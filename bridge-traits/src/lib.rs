//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the culler core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be implemented differently per platform.
//!
//! ## Traits
//!
//! ### Sandbox
//! - [`SecurityScopeProvider`](access::SecurityScopeProvider) - Mint, resolve and bracket capability tokens
//!
//! ### Media
//! - [`MediaDecoder`](media::MediaDecoder) - Image decode, embedded previews, video frames
//! - [`ContentTypeOracle`](content_type::ContentTypeOracle) - MIME lookup for unknown extensions
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Platform Requirements
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! let decoder = builder.media_decoder
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "MediaDecoder".to_string(),
//!         message: "No media decoder provided. \
//!                  Desktop: enable the desktop-shims feature.".to_string(),
//!     })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should convert platform-specific errors into the closest
//! typed variant and include the affected path in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.

pub mod access;
pub mod content_type;
pub mod error;
pub mod media;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use access::{PortableAccessToken, ResolvedToken, SecurityScopeProvider};
pub use content_type::{ContentTypeOracle, NoContentTypes};
pub use media::{DecodeRequest, DecodedImage, MediaDecoder};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
