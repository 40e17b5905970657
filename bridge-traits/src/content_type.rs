//! Content-type lookup used when a file extension is not in the built-in
//! media tables.

use std::path::Path;

/// Maps a path to a MIME type.
///
/// Implementations may look at the extension only, or sniff file contents.
pub trait ContentTypeOracle: Send + Sync {
    /// MIME type of `path` such as `image/webp`, or `None` when unknown.
    fn content_type(&self, path: &Path) -> Option<String>;

    fn is_image(&self, path: &Path) -> bool {
        self.content_type(path)
            .is_some_and(|mime| mime.starts_with("image/"))
    }

    fn is_video(&self, path: &Path) -> bool {
        self.content_type(path)
            .is_some_and(|mime| mime.starts_with("video/"))
    }
}

/// Oracle that knows nothing; every unknown extension stays unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContentTypes;

impl ContentTypeOracle for NoContentTypes {
    fn content_type(&self, _path: &Path) -> Option<String> {
        None
    }
}
