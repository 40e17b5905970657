//! Media classification by extension with a content-type fallback.

use bridge_traits::content_type::ContentTypeOracle;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Built-in still image extensions, camera RAW included.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "tiff", "tif", "raw", "cr2", "cr3", "nef", "arw", "dng", "orf",
    "rw2",
];

/// Built-in video container extensions.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mov", "mp4", "m4v", "avi", "mkv", "webm", "wmv", "flv", "f4v", "mpg", "mpeg", "m2v", "ts",
    "mts", "m2ts", "3gp", "3g2", "asf", "ogv", "mxf", "vob", "dv",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// Decides whether a file is an image, a video or neither.
///
/// Known extensions are matched case-insensitively against the fixed tables
/// (plus any configured extras); everything else is asked of the
/// [`ContentTypeOracle`].
#[derive(Clone)]
pub struct MediaClassifier {
    image_extensions: HashSet<String>,
    video_extensions: HashSet<String>,
    oracle: Arc<dyn ContentTypeOracle>,
}

impl fmt::Debug for MediaClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaClassifier")
            .field("image_extensions", &self.image_extensions.len())
            .field("video_extensions", &self.video_extensions.len())
            .finish()
    }
}

impl MediaClassifier {
    pub fn new(oracle: Arc<dyn ContentTypeOracle>) -> Self {
        Self {
            image_extensions: IMAGE_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            video_extensions: VIDEO_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
            oracle,
        }
    }

    /// Adds extensions on top of the built-in tables. Leading dots and case
    /// are ignored.
    pub fn with_extra_extensions<I, V>(mut self, images: I, videos: V) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        self.image_extensions
            .extend(images.into_iter().map(|ext| normalize_extension(ext.as_ref())));
        self.video_extensions
            .extend(videos.into_iter().map(|ext| normalize_extension(ext.as_ref())));
        self
    }

    pub fn classify(&self, path: &Path) -> Option<MediaKind> {
        if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
            let ext = normalize_extension(ext);
            if self.image_extensions.contains(&ext) {
                return Some(MediaKind::Image);
            }
            if self.video_extensions.contains(&ext) {
                return Some(MediaKind::Video);
            }
        }

        if self.oracle.is_image(path) {
            Some(MediaKind::Image)
        } else if self.oracle.is_video(path) {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    pub fn is_media(&self, path: &Path) -> bool {
        self.classify(path).is_some()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::content_type::NoContentTypes;

    struct WebpOracle;

    impl ContentTypeOracle for WebpOracle {
        fn content_type(&self, path: &Path) -> Option<String> {
            match path.extension()?.to_str()? {
                "webp" => Some("image/webp".to_string()),
                "rmvb" => Some("video/vnd.rn-realvideo".to_string()),
                "txt" => Some("text/plain".to_string()),
                _ => None,
            }
        }
    }

    #[test]
    fn fixed_tables_match_case_insensitively() {
        let classifier = MediaClassifier::new(Arc::new(NoContentTypes));
        assert_eq!(classifier.classify(Path::new("/a/IMG.JPG")), Some(MediaKind::Image));
        assert_eq!(classifier.classify(Path::new("/a/raw.Cr3")), Some(MediaKind::Image));
        assert_eq!(classifier.classify(Path::new("/a/clip.MTS")), Some(MediaKind::Video));
        assert_eq!(classifier.classify(Path::new("/a/notes.txt")), None);
        assert_eq!(classifier.classify(Path::new("/a/README")), None);
    }

    #[test]
    fn oracle_covers_unknown_extensions() {
        let classifier = MediaClassifier::new(Arc::new(WebpOracle));
        assert_eq!(classifier.classify(Path::new("x.webp")), Some(MediaKind::Image));
        assert_eq!(classifier.classify(Path::new("x.rmvb")), Some(MediaKind::Video));
        assert!(!classifier.is_media(Path::new("x.txt")));
    }

    #[test]
    fn extra_extensions_extend_tables() {
        let classifier = MediaClassifier::new(Arc::new(NoContentTypes))
            .with_extra_extensions([".RAF"], ["braw"]);
        assert_eq!(classifier.classify(Path::new("x.raf")), Some(MediaKind::Image));
        assert_eq!(classifier.classify(Path::new("x.BRAW")), Some(MediaKind::Video));
    }
}
