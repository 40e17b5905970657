//! Content-type oracle backed by `mime_guess`.

use bridge_traits::content_type::ContentTypeOracle;
use std::path::Path;

/// Extension-based MIME lookup using the `mime_guess` database.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeGuessOracle;

impl ContentTypeOracle for MimeGuessOracle {
    fn content_type(&self, path: &Path) -> Option<String> {
        mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve() {
        let oracle = MimeGuessOracle;
        assert_eq!(
            oracle.content_type(Path::new("a.webp")).as_deref(),
            Some("image/webp")
        );
        assert!(oracle.is_image(Path::new("scan.bmp")));
        assert!(oracle.is_video(Path::new("clip.mov")));
        assert!(!oracle.is_image(Path::new("notes.txt")));
        assert_eq!(oracle.content_type(Path::new("no_extension")), None);
    }
}
