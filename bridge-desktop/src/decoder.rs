//! Media decoder built on the `image` crate.
//!
//! Ordinary formats (JPEG, PNG, TIFF, WebP, ...) decode directly. RAW
//! containers cannot be developed here, so they always go through their
//! largest embedded JPEG preview. That includes full-resolution requests:
//! display images of RAW files are bounded by the preview's resolution, not
//! the sensor's. Video frames are delegated to [`FfmpegFrameExtractor`].

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{DecodeRequest, DecodedImage, MediaDecoder},
};
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageReader};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

use crate::embedded::{largest_embedded_jpeg, largest_jpeg};
use crate::ffmpeg::FfmpegFrameExtractor;

/// Extensions of camera RAW containers whose pixels come from an embedded
/// preview.
pub const RAW_EXTENSIONS: &[&str] = &[
    "raw", "cr2", "cr3", "nef", "nrw", "arw", "srf", "sr2", "dng", "orf", "rw2", "raf", "pef",
];

pub fn is_raw_container(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            RAW_EXTENSIONS
                .iter()
                .any(|raw| raw.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Desktop [`MediaDecoder`] implementation.
#[derive(Debug, Clone, Default)]
pub struct ImageCrateDecoder {
    frames: FfmpegFrameExtractor,
}

impl ImageCrateDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_extractor(frames: FfmpegFrameExtractor) -> Self {
        Self { frames }
    }
}

fn map_image_error(err: ImageError, path: &Path) -> BridgeError {
    match err {
        ImageError::Unsupported(e) => {
            BridgeError::UnsupportedFormat(format!("{}: {e}", path.display()))
        }
        ImageError::IoError(e) => BridgeError::from_io(e, path),
        other => BridgeError::CorruptedData(format!("{}: {other}", path.display())),
    }
}

fn read_source(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| BridgeError::from_io(e, path))
}

fn decode_bytes(bytes: &[u8], path: &Path) -> Result<DynamicImage> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BridgeError::from_io(e, path))?
        .decode()
        .map_err(|e| map_image_error(e, path))
}

/// Downscales so the longest edge is at most `max_pixel_size`. Never upscales.
fn fit(image: DynamicImage, max_pixel_size: u32) -> DynamicImage {
    let max_pixel_size = max_pixel_size.max(1);
    if image.width().max(image.height()) <= max_pixel_size {
        return image;
    }
    image.resize(max_pixel_size, max_pixel_size, FilterType::Triangle)
}

fn into_decoded(image: DynamicImage) -> DecodedImage {
    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    DecodedImage::new(width, height, rgba.into_raw())
}

/// Blocking decode path shared by thumbnail and display requests.
fn decode_blocking(path: &Path, request: DecodeRequest) -> Result<DecodedImage> {
    let bytes = read_source(path)?;

    if is_raw_container(path) {
        let preview = largest_jpeg(&bytes).ok_or_else(|| {
            BridgeError::UnsupportedFormat(format!(
                "{}: no embedded preview in RAW container",
                path.display()
            ))
        })?;
        debug!(bytes = preview.len(), "Using embedded RAW preview");
        let image = decode_bytes(preview, path)?;
        return Ok(into_decoded(fit(image, request.max_pixel_size)));
    }

    if request.prefer_embedded {
        if let Some(preview) = largest_embedded_jpeg(&bytes) {
            match decode_bytes(preview, path) {
                Ok(image) if image.width().max(image.height()) >= request.max_pixel_size => {
                    debug!(bytes = preview.len(), "Using embedded preview");
                    return Ok(into_decoded(fit(image, request.max_pixel_size)));
                }
                _ => {}
            }
        }
    }

    let image = decode_bytes(&bytes, path)?;
    Ok(into_decoded(fit(image, request.max_pixel_size)))
}

fn dimensions_blocking(path: &Path) -> Result<(u32, u32)> {
    if is_raw_container(path) {
        let bytes = read_source(path)?;
        let preview = largest_jpeg(&bytes).ok_or_else(|| {
            BridgeError::UnsupportedFormat(format!("{}: no embedded preview", path.display()))
        })?;
        return ImageReader::new(Cursor::new(preview))
            .with_guessed_format()
            .map_err(|e| BridgeError::from_io(e, path))?
            .into_dimensions()
            .map_err(|e| map_image_error(e, path));
    }

    ImageReader::open(path)
        .map_err(|e| BridgeError::from_io(e, path))?
        .with_guessed_format()
        .map_err(|e| BridgeError::from_io(e, path))?
        .into_dimensions()
        .map_err(|e| map_image_error(e, path))
}

async fn on_blocking_pool<T, F>(path: &Path, work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(PathBuf) -> Result<T> + Send + 'static,
{
    let owned = path.to_path_buf();
    core_async::task::run_blocking(move || work(owned))
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("decode task failed: {e}")))?
}

#[async_trait]
impl MediaDecoder for ImageCrateDecoder {
    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn decode_image(&self, path: &Path, request: DecodeRequest) -> Result<DecodedImage> {
        on_blocking_pool(path, move |path| decode_blocking(&path, request)).await
    }

    #[instrument(skip(self, path), fields(path = %path.display()))]
    async fn extract_video_frame(&self, path: &Path, max_pixel_size: u32) -> Result<DecodedImage> {
        self.frames.extract_frame(path, max_pixel_size).await
    }

    async fn image_dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        on_blocking_pool(path, |path| dimensions_blocking(&path)).await
    }
}
