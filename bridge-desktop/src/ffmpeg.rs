//! Video frame extraction through the `ffmpeg` command-line tool.

use bridge_traits::{
    error::{BridgeError, Result},
    media::DecodedImage,
};
use image::ImageFormat;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Extracts single frames by piping a PNG out of `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegFrameExtractor {
    binary: PathBuf,
}

impl Default for FfmpegFrameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegFrameExtractor {
    /// Uses the `ffmpeg` binary found on `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn frame_args(input: &Path, max_pixel_size: u32) -> Vec<OsString> {
        // Fit inside a max x max box without upscaling; keep dimensions even.
        let scale = format!(
            "scale=w='min(iw,{max_pixel_size})':h='min(ih,{max_pixel_size})':force_original_aspect_ratio=decrease:force_divisible_by=2"
        );
        vec![
            "-v".into(),
            "error".into(),
            "-ss".into(),
            "0".into(),
            "-i".into(),
            input.as_os_str().to_os_string(),
            "-frames:v".into(),
            "1".into(),
            "-vf".into(),
            scale.into(),
            "-f".into(),
            "image2pipe".into(),
            "-vcodec".into(),
            "png".into(),
            "pipe:1".into(),
        ]
    }

    /// Grabs the frame at t=0, scaled so its longest edge is at most
    /// `max_pixel_size`.
    pub async fn extract_frame(&self, input: &Path, max_pixel_size: u32) -> Result<DecodedImage> {
        if !core_async::fs::try_exists(input)
            .await
            .map_err(|e| BridgeError::from_io(e, input))?
        {
            return Err(BridgeError::NotFound(input.display().to_string()));
        }

        let output = Command::new(&self.binary)
            .args(Self::frame_args(input, max_pixel_size))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BridgeError::NotAvailable(format!(
                    "ffmpeg binary not found at {}",
                    self.binary.display()
                )),
                _ => BridgeError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BridgeError::UnsupportedFormat(format!(
                "ffmpeg failed: {}",
                stderr.trim()
            )));
        }
        if output.stdout.is_empty() {
            return Err(BridgeError::UnsupportedFormat(
                "ffmpeg produced no frame".to_string(),
            ));
        }

        debug!(bytes = output.stdout.len(), "Extracted video frame");
        let png = output.stdout;
        core_async::task::run_blocking(move || -> Result<DecodedImage> {
            let frame = image::load_from_memory_with_format(&png, ImageFormat::Png)
                .map_err(|e| BridgeError::CorruptedData(format!("frame decode: {e}")))?
                .into_rgba8();
            let (width, height) = frame.dimensions();
            Ok(DecodedImage::new(width, height, frame.into_raw()))
        })
        .await
        .map_err(|e| BridgeError::OperationFailed(format!("frame decode task: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_args_seek_to_start_and_bound_size() {
        let args = FfmpegFrameExtractor::frame_args(Path::new("/clips/a.mov"), 512);
        let rendered: Vec<String> = args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();

        let ss = rendered.iter().position(|arg| arg == "-ss").unwrap();
        assert_eq!(rendered[ss + 1], "0");
        assert!(rendered.contains(&"/clips/a.mov".to_string()));
        assert!(rendered.iter().any(|arg| arg.contains("min(iw,512)")));
        assert_eq!(rendered.last().map(String::as_str), Some("pipe:1"));
    }

    #[tokio::test]
    async fn missing_binary_is_reported_as_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.mp4");
        std::fs::write(&clip, b"not really a video").unwrap();

        let extractor = FfmpegFrameExtractor::with_binary(dir.path().join("no-such-ffmpeg"));
        let err = extractor.extract_frame(&clip, 256).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotAvailable(_)));
    }

    #[tokio::test]
    async fn missing_input_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = FfmpegFrameExtractor::new();
        let err = extractor
            .extract_frame(&dir.path().join("gone.mov"), 256)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }
}
