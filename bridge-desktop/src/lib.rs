//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `SecurityScopeProvider` using path-fingerprint tokens (`PathScopeProvider`)
//! - `MediaDecoder` using the `image` crate, embedded RAW previews and the
//!   `ffmpeg` CLI for video frames (`ImageCrateDecoder`)
//! - `ContentTypeOracle` using `mime_guess` (`MimeGuessOracle`)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{ImageCrateDecoder, MimeGuessOracle, PathScopeProvider};
//! use std::sync::Arc;
//!
//! let scopes = Arc::new(PathScopeProvider::new());
//! let decoder = Arc::new(ImageCrateDecoder::new());
//! let oracle = Arc::new(MimeGuessOracle);
//! // Hand these to CoreConfig::builder()
//! ```

mod content_type;
mod decoder;
pub mod embedded;
mod ffmpeg;
mod scope;

pub use content_type::MimeGuessOracle;
pub use decoder::{is_raw_container, ImageCrateDecoder, RAW_EXTENSIONS};
pub use ffmpeg::FfmpegFrameExtractor;
pub use scope::PathScopeProvider;
