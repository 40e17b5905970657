//! Capability token resolution with paired, reentrant scope brackets.
//!
//! A persisted [`PortableAccessToken`] is turned into a [`ScopedAccess`]
//! guard: the scope opens when the guard is created and closes when it is
//! dropped, on every exit path. Stale tokens are re-minted while the scope
//! is open and handed back so the owner can persist them.

use bridge_traits::access::{PortableAccessToken, SecurityScopeProvider};
use bridge_traits::error::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Open access bracket for one path. Closed on drop.
pub struct ScopedAccess {
    provider: Arc<dyn SecurityScopeProvider>,
    path: PathBuf,
    active: bool,
}

impl ScopedAccess {
    fn open(provider: Arc<dyn SecurityScopeProvider>, path: PathBuf) -> Self {
        let active = provider.start_access(&path);
        if !active {
            debug!(path = %path.display(), "Host refused to open access scope");
        }
        Self {
            provider,
            path,
            active,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// False when the host refused the bracket; access may still work if the
    /// path is reachable without one.
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for ScopedAccess {
    fn drop(&mut self) {
        if self.active {
            self.provider.stop_access(&self.path);
        }
    }
}

impl fmt::Debug for ScopedAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedAccess")
            .field("path", &self.path)
            .field("active", &self.active)
            .finish()
    }
}

/// Result of [`AccessTokenResolver::resolve`].
#[derive(Debug)]
pub struct ResolvedAccess {
    pub scope: ScopedAccess,
    /// Replacement for a stale token; the caller persists it.
    pub refreshed: Option<PortableAccessToken>,
}

#[derive(Clone)]
pub struct AccessTokenResolver {
    provider: Arc<dyn SecurityScopeProvider>,
}

impl fmt::Debug for AccessTokenResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessTokenResolver").finish_non_exhaustive()
    }
}

impl AccessTokenResolver {
    pub fn new(provider: Arc<dyn SecurityScopeProvider>) -> Self {
        Self { provider }
    }

    /// Resolves `token` and opens its scope.
    ///
    /// # Errors
    ///
    /// Whatever the provider reports for an undecodable token or a target
    /// that no longer exists. No scope is opened in that case.
    pub async fn resolve(&self, token: &PortableAccessToken) -> Result<ResolvedAccess> {
        let resolved = self.provider.resolve(token).await?;
        let scope = ScopedAccess::open(Arc::clone(&self.provider), resolved.path);

        let refreshed = if resolved.is_stale && scope.is_active() {
            match self.provider.mint(scope.path()).await {
                Ok(fresh) => {
                    debug!(path = %scope.path().display(), "Refreshed stale access token");
                    Some(fresh)
                }
                Err(err) => {
                    warn!(path = %scope.path().display(), error = %err, "Could not refresh stale token");
                    None
                }
            }
        } else {
            None
        };

        Ok(ResolvedAccess { scope, refreshed })
    }

    /// Opens a scope for a path reached without a token.
    pub fn scope(&self, path: &Path) -> ScopedAccess {
        ScopedAccess::open(Arc::clone(&self.provider), path.to_path_buf())
    }

    /// Mints a token for `path`, bracketed by its own scope.
    pub async fn mint(&self, path: &Path) -> Result<PortableAccessToken> {
        let _scope = self.scope(path);
        self.provider.mint(path).await
    }
}
