//! Media Decoding Abstractions
//!
//! Decoding is platform specific: desktop hosts use pure-Rust codecs plus an
//! external frame extractor for video, mobile hosts hand the work to native
//! image frameworks. The core only sees RGBA pixel buffers.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::path::Path;

use crate::error::Result;

/// Parameters for an image decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeRequest {
    /// Longest edge of the returned image, in pixels.
    pub max_pixel_size: u32,
    /// Use an embedded preview (JPEG inside a RAW container, EXIF thumbnail)
    /// when one is large enough instead of decoding the full image.
    pub prefer_embedded: bool,
}

impl DecodeRequest {
    pub fn thumbnail(max_pixel_size: u32) -> Self {
        Self {
            max_pixel_size,
            prefer_embedded: true,
        }
    }

    pub fn full_resolution(max_pixel_size: u32) -> Self {
        Self {
            max_pixel_size,
            prefer_embedded: false,
        }
    }
}

/// A decoded RGBA8 image.
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixels, `width * height * 4` bytes.
    pub pixels: Bytes,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            pixels: pixels.into(),
        }
    }

    /// Memory held by the pixel buffer.
    pub fn byte_cost(&self) -> usize {
        self.pixels.len()
    }

    pub fn longest_edge(&self) -> u32 {
        self.width.max(self.height)
    }
}

impl fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Platform media decoder.
///
/// Errors use `NotFound`, `PermissionDenied`, `CorruptedData` and
/// `UnsupportedFormat` so callers can map them onto their own error types.
#[async_trait]
pub trait MediaDecoder: Send + Sync {
    /// Decode an image file, downscaled so its longest edge is at most
    /// `request.max_pixel_size`. Never upscales.
    async fn decode_image(&self, path: &Path, request: DecodeRequest) -> Result<DecodedImage>;

    /// Extract a single frame near the start of a video, downscaled to at
    /// most `max_pixel_size` on its longest edge.
    async fn extract_video_frame(&self, path: &Path, max_pixel_size: u32) -> Result<DecodedImage>;

    /// Read pixel dimensions without decoding the full image.
    async fn image_dimensions(&self, path: &Path) -> Result<(u32, u32)>;
}
