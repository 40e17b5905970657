//! Cached derivative value.

use bridge_traits::media::DecodedImage;
use bytes::Bytes;
use core_library::media_kind::MediaKind;
use std::fmt;
use std::sync::Arc;

/// A decoded thumbnail, display image or video frame.
///
/// Cloning is cheap: every clone shares one pixel buffer, so coalesced
/// callers and the cache hold the same allocation.
#[derive(Clone)]
pub struct DerivativeImage {
    inner: Arc<DecodedImage>,
    kind: MediaKind,
}

impl DerivativeImage {
    pub fn new(image: DecodedImage, kind: MediaKind) -> Self {
        Self {
            inner: Arc::new(image),
            kind,
        }
    }

    pub fn width(&self) -> u32 {
        self.inner.width
    }

    pub fn height(&self) -> u32 {
        self.inner.height
    }

    /// RGBA8 pixels, row-major
    pub fn pixels(&self) -> &Bytes {
        &self.inner.pixels
    }

    /// Kind of the source the derivative was made from
    pub fn source_kind(&self) -> MediaKind {
        self.kind
    }

    /// Bytes charged against the tier budget
    pub fn cost(&self) -> u64 {
        self.inner.byte_cost() as u64
    }

    /// True when both values share the same decoded buffer.
    pub fn same_as(&self, other: &DerivativeImage) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl PartialEq for DerivativeImage {
    fn eq(&self, other: &Self) -> bool {
        self.same_as(other) || (self.kind == other.kind && *self.inner == *other.inner)
    }
}

impl fmt::Debug for DerivativeImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivativeImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("kind", &self.kind)
            .field("cost", &self.cost())
            .finish()
    }
}
