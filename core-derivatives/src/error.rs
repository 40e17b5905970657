use bridge_traits::error::BridgeError;
use core_async::coordinator::JobError;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a derivative could not be produced. Never cached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl LoadError {
    pub(crate) fn from_bridge(err: BridgeError, path: &Path) -> Self {
        match err {
            BridgeError::NotFound(_) => LoadError::FileNotFound(path.to_path_buf()),
            BridgeError::PermissionDenied(msg) | BridgeError::InvalidToken(msg) => {
                LoadError::PermissionDenied(msg)
            }
            BridgeError::CorruptedData(msg) => LoadError::CorruptedData(msg),
            BridgeError::UnsupportedFormat(msg) => LoadError::UnsupportedFormat(msg),
            other => LoadError::Unknown(other.to_string()),
        }
    }
}

impl From<JobError> for LoadError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Cancelled => LoadError::Cancelled,
            JobError::Panicked(msg) => LoadError::Unknown(format!("generation panicked: {msg}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_errors_map_to_load_errors() {
        let path = Path::new("/p/a.jpg");
        assert_eq!(
            LoadError::from_bridge(BridgeError::NotFound("x".into()), path),
            LoadError::FileNotFound(path.to_path_buf())
        );
        assert!(matches!(
            LoadError::from_bridge(BridgeError::InvalidToken("t".into()), path),
            LoadError::PermissionDenied(_)
        ));
        assert!(matches!(
            LoadError::from_bridge(BridgeError::OperationFailed("boom".into()), path),
            LoadError::Unknown(_)
        ));
        assert_eq!(LoadError::from(JobError::Cancelled), LoadError::Cancelled);
    }
}
