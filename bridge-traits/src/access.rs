//! Security-Scoped Access Abstractions
//!
//! Sandboxed hosts only grant filesystem access through capability tokens
//! handed out when the user picks a file or folder. A token is persisted with
//! the catalog and later resolved back into a path plus a scoped access
//! bracket. Tokens can silently go stale (the target moved, the volume was
//! remounted); resolution reports staleness so the owner can re-mint and
//! persist a fresh token.
//!
//! # Example
//!
//! ```ignore
//! use bridge_traits::access::SecurityScopeProvider;
//!
//! async fn open(provider: &dyn SecurityScopeProvider, token: &PortableAccessToken) -> Result<()> {
//!     let resolved = provider.resolve(token).await?;
//!     if provider.start_access(&resolved.path) {
//!         // read files under resolved.path
//!         provider.stop_access(&resolved.path);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Opaque, persistable capability token.
///
/// The byte layout belongs to the provider that minted it. The core only
/// stores and hands it back.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortableAccessToken(Vec<u8>);

impl PortableAccessToken {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Token bytes are credentials and stay out of logs.
impl fmt::Debug for PortableAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PortableAccessToken(<{} bytes>)", self.0.len())
    }
}

/// Outcome of resolving a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedToken {
    /// Path the token grants access to.
    pub path: PathBuf,
    /// The token still resolves but should be re-minted and persisted.
    pub is_stale: bool,
}

/// Platform capability that mints, resolves and brackets access tokens.
///
/// `start_access` / `stop_access` must be paired. Implementations keep a
/// per-path count so nested brackets for the same path are allowed.
#[async_trait]
pub trait SecurityScopeProvider: Send + Sync {
    /// Create a token granting future access to `path`.
    ///
    /// Fails with `PermissionDenied` when the caller currently holds no access
    /// to the path.
    async fn mint(&self, path: &Path) -> Result<PortableAccessToken>;

    /// Resolve a persisted token.
    ///
    /// Returns `InvalidToken` when the bytes cannot be decoded and `NotFound`
    /// when the target no longer exists.
    async fn resolve(&self, token: &PortableAccessToken) -> Result<ResolvedToken>;

    /// Begin accessing resources under `path`.
    ///
    /// Returns `false` if the host refused to open the scope.
    fn start_access(&self, path: &Path) -> bool;

    /// End one access bracket previously opened with `start_access`.
    fn stop_access(&self, path: &Path);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_token_bytes() {
        let token = PortableAccessToken::new(b"secret-bookmark".to_vec());
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("15 bytes"));
    }

    #[test]
    fn token_serializes_as_plain_bytes() {
        let token = PortableAccessToken::new(vec![1, 2, 3]);
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "[1,2,3]");
        let back: PortableAccessToken = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
        assert_eq!(back.len(), 3);
        assert!(!back.is_empty());
    }
}
