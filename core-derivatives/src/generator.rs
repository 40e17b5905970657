//! The generation job run under the coordinator.

use bridge_traits::access::PortableAccessToken;
use bridge_traits::media::{DecodeRequest, MediaDecoder};
use core_async::sync::CancellationToken;
use core_library::catalog::Catalog;
use core_library::media_kind::{MediaClassifier, MediaKind};
use core_library::models::{MediaId, MediaRecord};
use core_sync::access::{AccessTokenResolver, ScopedAccess};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::error::{LoadError, Result};
use crate::image::DerivativeImage;
use crate::tier::Tier;

/// Thumbnails are decoded at this multiple of the requested size.
pub const THUMBNAIL_OVERSAMPLE: u32 = 2;

/// Everything a job needs from the record, owned so the job can outlive
/// the caller.
#[derive(Debug, Clone)]
pub(crate) struct GenerationRequest {
    pub id: MediaId,
    pub path: PathBuf,
    pub token: Option<PortableAccessToken>,
    pub tier: Tier,
    pub size: u32,
}

impl GenerationRequest {
    pub fn new(record: &MediaRecord, tier: Tier, size: u32) -> Self {
        Self {
            id: record.id,
            path: record.path.clone(),
            token: record.access_token.clone(),
            tier,
            size: size.max(1),
        }
    }
}

pub(crate) struct Generator {
    decoder: Arc<dyn MediaDecoder>,
    resolver: AccessTokenResolver,
    classifier: MediaClassifier,
    catalog: Option<Arc<dyn Catalog>>,
}

impl fmt::Debug for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Generator")
            .field("classifier", &self.classifier)
            .field("persists_tokens", &self.catalog.is_some())
            .finish_non_exhaustive()
    }
}

impl Generator {
    pub fn new(
        decoder: Arc<dyn MediaDecoder>,
        resolver: AccessTokenResolver,
        classifier: MediaClassifier,
        catalog: Option<Arc<dyn Catalog>>,
    ) -> Self {
        Self {
            decoder,
            resolver,
            classifier,
            catalog,
        }
    }

    /// Produces one derivative. The access scope opened for the record is
    /// held until this returns.
    #[instrument(skip_all, fields(path = %request.path.display(), tier = ?request.tier, size = request.size))]
    pub async fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<DerivativeImage> {
        let _scope = self.open_scope(&request).await?;

        if !core_async::fs::exists(&request.path).await {
            return Err(LoadError::FileNotFound(request.path));
        }

        if cancel.is_cancelled() {
            debug!("Generation abandoned before decode");
            return Err(LoadError::Cancelled);
        }

        let kind = self.classifier.classify(&request.path).ok_or_else(|| {
            LoadError::UnsupportedFormat(format!(
                "not an image or video: {}",
                request.path.display()
            ))
        })?;

        let decoded = match (kind, request.tier) {
            (MediaKind::Image, Tier::Thumbnail) => self
                .decoder
                .decode_image(
                    &request.path,
                    DecodeRequest::thumbnail(request.size.saturating_mul(THUMBNAIL_OVERSAMPLE)),
                )
                .await
                .map_err(|err| LoadError::from_bridge(err, &request.path))?,
            (MediaKind::Image, Tier::Display) => self
                .decoder
                .decode_image(&request.path, DecodeRequest::full_resolution(request.size))
                .await
                .map_err(|err| LoadError::from_bridge(err, &request.path))?,
            (MediaKind::Video, _) => self
                .decoder
                .extract_video_frame(&request.path, request.size)
                .await
                .map_err(|err| {
                    LoadError::UnsupportedFormat(format!("no frame extracted: {err}"))
                })?,
        };

        debug!(width = decoded.width, height = decoded.height, "Derivative generated");
        Ok(DerivativeImage::new(decoded, kind))
    }

    async fn open_scope(&self, request: &GenerationRequest) -> Result<Option<ScopedAccess>> {
        let Some(token) = &request.token else {
            return Ok(None);
        };

        let resolved = self
            .resolver
            .resolve(token)
            .await
            .map_err(|err| LoadError::PermissionDenied(format!("access token: {err}")))?;

        if !resolved.scope.is_active() {
            return Err(LoadError::PermissionDenied(format!(
                "access scope refused for {}",
                request.path.display()
            )));
        }

        if let Some(fresh) = resolved.refreshed {
            self.persist_token(request.id, fresh).await;
        }

        Ok(Some(resolved.scope))
    }

    async fn persist_token(&self, id: MediaId, token: PortableAccessToken) {
        let Some(catalog) = &self.catalog else {
            return;
        };
        match catalog.find_record(id).await {
            Ok(Some(mut record)) => {
                record.access_token = Some(token);
                if let Err(err) = catalog.update_record(record).await {
                    warn!(%id, error = %err, "Could not store refreshed access token");
                }
            }
            Ok(None) => debug!(%id, "Record gone before refreshed token was stored"),
            Err(err) => warn!(%id, error = %err, "Could not look up record for token refresh"),
        }
    }
}
