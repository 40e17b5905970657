//! # Metadata Enrichment
//!
//! Fills file information and pixel dimensions into records created by the
//! sync engine. See [`MetadataEnricher`].

pub mod enricher;
pub mod error;

pub use enricher::{EnrichmentConfig, EnrichmentFailure, EnrichmentReport, MetadataEnricher};
pub use error::{MetadataError, Result};
