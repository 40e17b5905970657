//! Path-Fingerprint Security Scope Implementation
//!
//! Desktop operating systems outside the macOS sandbox have no native
//! bookmark service, so tokens are self-describing: a base64-encoded JSON
//! payload holding the path, a filesystem identity for the target and a
//! SHA-256 fingerprint over both. A token goes stale when the path now
//! points at a different filesystem object (deleted and recreated, swapped
//! volume).

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_traits::{
    access::{PortableAccessToken, ResolvedToken, SecurityScopeProvider},
    error::{BridgeError, Result},
};
use chrono::Utc;
use core_async::fs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

const TOKEN_VERSION: u8 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct TokenPayload {
    version: u8,
    path: PathBuf,
    identity: u64,
    issued_at: i64,
    fingerprint: String,
}

/// Token provider backed by path fingerprints.
///
/// Scope brackets are reference counted per path so nested
/// `start_access` calls for one folder are allowed.
#[derive(Debug, Default)]
pub struct PathScopeProvider {
    active: Mutex<HashMap<PathBuf, usize>>,
}

impl PathScopeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open access brackets for `path`.
    pub fn active_scopes(&self, path: &Path) -> usize {
        self.active
            .lock()
            .map(|active| active.get(path).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn encode(payload: &TokenPayload) -> Result<PortableAccessToken> {
        let json = serde_json::to_vec(payload)
            .map_err(|e| BridgeError::OperationFailed(format!("token encode: {e}")))?;
        Ok(PortableAccessToken::new(STANDARD.encode(json)))
    }

    fn decode(token: &PortableAccessToken) -> Result<TokenPayload> {
        let json = STANDARD
            .decode(token.as_bytes())
            .map_err(|e| BridgeError::InvalidToken(format!("not base64: {e}")))?;
        let payload: TokenPayload = serde_json::from_slice(&json)
            .map_err(|e| BridgeError::InvalidToken(format!("malformed payload: {e}")))?;

        if payload.version != TOKEN_VERSION {
            return Err(BridgeError::InvalidToken(format!(
                "unsupported token version {}",
                payload.version
            )));
        }
        if fingerprint(&payload.path, payload.identity) != payload.fingerprint {
            return Err(BridgeError::InvalidToken("fingerprint mismatch".to_string()));
        }
        Ok(payload)
    }
}

fn fingerprint(path: &Path, identity: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(identity.to_le_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(unix)]
fn file_identity(metadata: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    metadata.ino() ^ metadata.dev().rotate_left(32)
}

#[cfg(not(unix))]
fn file_identity(metadata: &Metadata) -> u64 {
    metadata
        .created()
        .ok()
        .and_then(|created| created.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

#[async_trait]
impl SecurityScopeProvider for PathScopeProvider {
    async fn mint(&self, path: &Path) -> Result<PortableAccessToken> {
        let metadata = fs::metadata(path)
            .await
            .map_err(|e| BridgeError::from_io(e, path))?;
        let identity = file_identity(&metadata);

        let payload = TokenPayload {
            version: TOKEN_VERSION,
            path: path.to_path_buf(),
            identity,
            issued_at: Utc::now().timestamp(),
            fingerprint: fingerprint(path, identity),
        };
        debug!(path = %path.display(), "Minted access token");
        Self::encode(&payload)
    }

    async fn resolve(&self, token: &PortableAccessToken) -> Result<ResolvedToken> {
        let payload = Self::decode(token)?;
        let metadata = fs::metadata(&payload.path)
            .await
            .map_err(|e| BridgeError::from_io(e, &payload.path))?;

        let is_stale = file_identity(&metadata) != payload.identity;
        if is_stale {
            debug!(path = %payload.path.display(), "Access token is stale");
        }
        Ok(ResolvedToken {
            path: payload.path,
            is_stale,
        })
    }

    fn start_access(&self, path: &Path) -> bool {
        match self.active.lock() {
            Ok(mut active) => {
                *active.entry(path.to_path_buf()).or_insert(0) += 1;
                true
            }
            Err(_) => {
                warn!(path = %path.display(), "Scope table poisoned; refusing access");
                false
            }
        }
    }

    fn stop_access(&self, path: &Path) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        if let Some(count) = active.get_mut(path) {
            *count -= 1;
            if *count == 0 {
                active.remove(path);
            }
        } else {
            warn!(path = %path.display(), "stop_access without matching start_access");
        }
    }
}
