//! Async filesystem helpers re-exported from the underlying runtime.

use std::path::Path;

pub use tokio::fs::{metadata, read, symlink_metadata, try_exists};

/// True when something exists at `path`. Errors (for example a parent the
/// process cannot traverse) count as absent.
pub async fn exists(path: impl AsRef<Path>) -> bool {
    try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exists_reports_presence() {
        let dir = std::env::temp_dir();
        assert!(exists(&dir).await);
        assert!(!exists(dir.join("core-async-definitely-missing-entry")).await);
    }
}
