//! # Record Enrichment
//!
//! Records are created bare by the sync engine. Enrichment is an explicit,
//! asynchronous second step that fills in what the filesystem and the decoder
//! can tell cheaply:
//!
//! - byte size and creation date from file metadata
//! - pixel dimensions for images, read from the header without decoding
//!
//! Every update is written back through the [`Catalog`]. A record that cannot
//! be read is reported and left untouched; the batch carries on.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::{EnrichmentConfig, MetadataEnricher};
//!
//! let enricher = MetadataEnricher::from_config(&core_config)
//!     .with_config(EnrichmentConfig::default().with_max_concurrent(2));
//! let report = enricher.enrich(&ids).await?;
//! println!("{} enriched", report.enriched);
//! ```

use bridge_traits::error::BridgeError;
use bridge_traits::media::MediaDecoder;
use chrono::{DateTime, Utc};
use core_library::catalog::Catalog;
use core_library::media_kind::{MediaClassifier, MediaKind};
use core_library::models::{MediaId, MediaRecord};
use core_runtime::config::CoreConfig;
use core_sync::access::{AccessTokenResolver, ScopedAccess};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{MetadataError, Result};

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrichmentConfig {
    /// Records read at the same time
    pub max_concurrent: usize,

    /// Re-read records that already carry dimensions
    pub refresh_enriched: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 4,
            refresh_enriched: false,
        }
    }
}

impl EnrichmentConfig {
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_refresh_enriched(mut self, refresh: bool) -> Self {
        self.refresh_enriched = refresh;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(MetadataError::Configuration(
                "max_concurrent must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Report
// =============================================================================

/// A record that could not be enriched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentFailure {
    pub id: MediaId,
    pub reason: String,
}

/// Outcome of one [`MetadataEnricher::enrich`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub requested: usize,
    /// Records written back to the catalog
    pub enriched: usize,
    /// Unknown ids and records already enriched
    pub skipped: usize,
    pub failures: Vec<EnrichmentFailure>,
}

enum Outcome {
    Enriched,
    Skipped,
    Failed(EnrichmentFailure),
}

// =============================================================================
// Enricher
// =============================================================================

pub struct MetadataEnricher {
    catalog: Arc<dyn Catalog>,
    decoder: Arc<dyn MediaDecoder>,
    resolver: AccessTokenResolver,
    classifier: MediaClassifier,
    config: EnrichmentConfig,
}

impl fmt::Debug for MetadataEnricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataEnricher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MetadataEnricher {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        decoder: Arc<dyn MediaDecoder>,
        resolver: AccessTokenResolver,
        classifier: MediaClassifier,
    ) -> Self {
        Self {
            catalog,
            decoder,
            resolver,
            classifier,
            config: EnrichmentConfig::default(),
        }
    }

    pub fn from_config(config: &CoreConfig) -> Self {
        let classifier = MediaClassifier::new(Arc::clone(&config.content_types))
            .with_extra_extensions(
                &config.sync.extra_image_extensions,
                &config.sync.extra_video_extensions,
            );
        Self::new(
            Arc::clone(&config.catalog),
            Arc::clone(&config.decoder),
            AccessTokenResolver::new(Arc::clone(&config.scope_provider)),
            classifier,
        )
    }

    pub fn with_config(mut self, config: EnrichmentConfig) -> Self {
        self.config = config;
        self
    }

    /// Enriches the records behind `ids`.
    ///
    /// # Errors
    ///
    /// `Configuration` for an invalid [`EnrichmentConfig`], `Library` when the
    /// catalog rejects a write. Unreadable files end up in
    /// [`EnrichmentReport::failures`].
    #[instrument(skip_all, fields(count = ids.len()))]
    pub async fn enrich(&self, ids: &[MediaId]) -> Result<EnrichmentReport> {
        self.config.validate()?;

        let outcomes: Vec<Result<Outcome>> = stream::iter(ids.iter().copied())
            .map(|id| self.enrich_one(id))
            .buffer_unordered(self.config.max_concurrent)
            .collect()
            .await;

        let mut report = EnrichmentReport {
            requested: ids.len(),
            ..EnrichmentReport::default()
        };
        for outcome in outcomes {
            match outcome? {
                Outcome::Enriched => report.enriched += 1,
                Outcome::Skipped => report.skipped += 1,
                Outcome::Failed(failure) => {
                    warn!(id = %failure.id, reason = %failure.reason, "Record enrichment failed");
                    report.failures.push(failure);
                }
            }
        }

        info!(
            enriched = report.enriched,
            skipped = report.skipped,
            failed = report.failures.len(),
            "Enrichment finished"
        );
        Ok(report)
    }

    async fn enrich_one(&self, id: MediaId) -> Result<Outcome> {
        let Some(mut record) = self.catalog.find_record(id).await? else {
            debug!(%id, "Record gone before enrichment");
            return Ok(Outcome::Skipped);
        };
        if record.is_enriched() && !self.config.refresh_enriched {
            return Ok(Outcome::Skipped);
        }

        let _scope = match self.open_scope(&record).await {
            Ok(scope) => scope,
            Err(err) => return Ok(failed(id, err)),
        };

        if let Err(err) = self.read_file_info(&mut record).await {
            return Ok(failed(id, err));
        }
        if self.classifier.classify(&record.path) == Some(MediaKind::Image) {
            match self.decoder.image_dimensions(&record.path).await {
                Ok((width, height)) => {
                    record.width = Some(width);
                    record.height = Some(height);
                }
                Err(err) => debug!(%id, error = %err, "Dimensions unavailable"),
            }
        }

        self.catalog.update_record(record).await?;
        Ok(Outcome::Enriched)
    }

    async fn open_scope(
        &self,
        record: &MediaRecord,
    ) -> std::result::Result<Option<ScopedAccess>, BridgeError> {
        match &record.access_token {
            Some(token) => Ok(Some(self.resolver.resolve(token).await?.scope)),
            None => Ok(None),
        }
    }

    async fn read_file_info(&self, record: &mut MediaRecord) -> std::result::Result<(), BridgeError> {
        let metadata = core_async::fs::metadata(&record.path)
            .await
            .map_err(|err| BridgeError::from_io(err, &record.path))?;

        record.file_size = metadata.len();
        if let Ok(created) = metadata.created().or_else(|_| metadata.modified()) {
            record.date_created = DateTime::<Utc>::from(created);
        }
        Ok(())
    }
}

fn failed(id: MediaId, err: BridgeError) -> Outcome {
    Outcome::Failed(EnrichmentFailure {
        id,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = EnrichmentConfig::default().with_max_concurrent(0);
        assert!(matches!(config.validate(), Err(MetadataError::Configuration(_))));
        assert!(EnrichmentConfig::default().validate().is_ok());
    }
}
