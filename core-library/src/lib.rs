//! # Library Management Module
//!
//! Owns the media catalog domain: records, folder bookmarks, albums and tags,
//! plus the [`Catalog`] interface the rest of the core uses to read and
//! mutate them.
//!
//! ## Overview
//!
//! This module provides:
//! - Domain models with UUID identifiers and validation
//! - Lexical path canonicalization shared by every path comparison
//! - Media classification (fixed extension tables + content-type fallback)
//! - An in-memory, arena-backed catalog with consistent many-to-many
//!   relationships
//! - Derived folder trees and record sort orders

pub mod arena;
pub mod catalog;
pub mod error;
pub mod media_kind;
pub mod models;
pub mod path;
pub mod sort;
pub mod tree;

pub use catalog::{Catalog, MemoryCatalog, RecordPredicate};
pub use error::{LibraryError, Result};
pub use media_kind::{MediaClassifier, MediaKind};
pub use models::{
    Album, AlbumId, BookmarkId, ColorLabel, ExifData, Flag, FolderBookmark, MediaId, MediaRecord,
    Tag, TagId,
};
pub use sort::SortOption;
pub use tree::FolderNode;
