//! Catalog trait and the in-memory implementation
//!
//! The persisted catalog is an external collaborator. The sync engine, the
//! derivative cache and the enricher only talk to it through [`Catalog`];
//! every call either applies fully or fails without side effects.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use core_async::sync::RwLock;

use crate::arena::LibraryArena;
use crate::error::{LibraryError, Result};
use crate::models::{
    Album, AlbumId, BookmarkId, FolderBookmark, MediaId, MediaRecord, Tag, TagId,
};

/// Predicate used by [`Catalog::count_records`].
pub type RecordPredicate<'a> = &'a (dyn Fn(&MediaRecord) -> bool + Send + Sync);

/// Catalog interface for data access operations
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Snapshot of every record
    async fn fetch_records(&self) -> Result<Vec<MediaRecord>>;

    /// Snapshot of every folder bookmark
    async fn fetch_bookmarks(&self) -> Result<Vec<FolderBookmark>>;

    /// Find a record by its ID
    async fn find_record(&self, id: MediaId) -> Result<Option<MediaRecord>>;

    /// Count records matching `predicate`
    async fn count_records(&self, predicate: RecordPredicate<'_>) -> Result<usize>;

    /// Insert a new record
    ///
    /// # Errors
    /// - `DuplicatePath` when a record already exists for the canonical path
    /// - `InvalidInput` when validation fails
    async fn insert_record(&self, record: MediaRecord) -> Result<()>;

    /// Replace an existing record
    async fn update_record(&self, record: MediaRecord) -> Result<()>;

    /// Delete a record by ID
    ///
    /// # Returns
    /// - `Ok(true)` if the record was deleted
    /// - `Ok(false)` if it was not found
    async fn delete_record(&self, id: MediaId) -> Result<bool>;

    /// Insert or refresh the bookmark for a folder path; returns the stored
    /// bookmark
    async fn upsert_bookmark(&self, bookmark: FolderBookmark) -> Result<FolderBookmark>;

    /// Delete a bookmark by ID
    async fn delete_bookmark(&self, id: BookmarkId) -> Result<bool>;
}

/// Catalog held entirely in memory behind an async `RwLock`.
///
/// Writers are serialized by the lock, giving the single-writer discipline
/// the sync engine relies on. Albums and tags are reachable through the
/// inherent methods.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    arena: RwLock<LibraryArena>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = MediaRecord>) -> Result<Self> {
        let mut arena = LibraryArena::new();
        for record in records {
            arena.insert_record(record)?;
        }
        Ok(Self {
            arena: RwLock::new(arena),
        })
    }

    pub async fn record_count(&self) -> usize {
        self.arena.read().await.record_count()
    }

    pub async fn find_by_path(&self, path: &Path) -> Option<MediaRecord> {
        self.arena.read().await.record_by_path(path).cloned()
    }

    pub async fn create_album(&self, album: Album) -> Result<AlbumId> {
        self.arena.write().await.create_album(album)
    }

    pub async fn delete_album(&self, id: AlbumId) -> Result<Album> {
        self.arena
            .write()
            .await
            .delete_album(&id)
            .ok_or_else(|| LibraryError::not_found("Album", id))
    }

    pub async fn set_album_parent(&self, child: AlbumId, parent: Option<AlbumId>) -> Result<()> {
        self.arena.write().await.set_album_parent(child, parent)
    }

    pub async fn album_children(&self, id: AlbumId) -> Vec<AlbumId> {
        self.arena.read().await.album_children(&id)
    }

    pub async fn add_to_album(&self, record: MediaId, album: AlbumId) -> Result<bool> {
        self.arena.write().await.link_album(record, album)
    }

    pub async fn remove_from_album(&self, record: MediaId, album: AlbumId) -> bool {
        self.arena.write().await.unlink_album(record, album)
    }

    pub async fn album_records(&self, album: AlbumId) -> Vec<MediaRecord> {
        let arena = self.arena.read().await;
        arena
            .album_records(&album)
            .iter()
            .filter_map(|id| arena.record(id).cloned())
            .collect()
    }

    pub async fn record_albums(&self, record: MediaId) -> Vec<Album> {
        let arena = self.arena.read().await;
        arena
            .record_albums(&record)
            .iter()
            .filter_map(|id| arena.album(id).cloned())
            .collect()
    }

    pub async fn create_tag(&self, tag: Tag) -> Result<TagId> {
        self.arena.write().await.create_tag(tag)
    }

    pub async fn delete_tag(&self, id: TagId) -> Result<Tag> {
        self.arena
            .write()
            .await
            .delete_tag(&id)
            .ok_or_else(|| LibraryError::not_found("Tag", id))
    }

    pub async fn tag_record(&self, record: MediaId, tag: TagId) -> Result<bool> {
        self.arena.write().await.link_tag(record, tag)
    }

    pub async fn untag_record(&self, record: MediaId, tag: TagId) -> bool {
        self.arena.write().await.unlink_tag(record, tag)
    }

    pub async fn tag_records(&self, tag: TagId) -> Vec<MediaRecord> {
        let arena = self.arena.read().await;
        arena
            .tag_records(&tag)
            .iter()
            .filter_map(|id| arena.record(id).cloned())
            .collect()
    }

    pub async fn record_tags(&self, record: MediaId) -> Vec<Tag> {
        let arena = self.arena.read().await;
        arena
            .record_tags(&record)
            .iter()
            .filter_map(|id| arena.tag(id).cloned())
            .collect()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn fetch_records(&self) -> Result<Vec<MediaRecord>> {
        Ok(self.arena.read().await.records().cloned().collect())
    }

    async fn fetch_bookmarks(&self) -> Result<Vec<FolderBookmark>> {
        Ok(self.arena.read().await.bookmarks().cloned().collect())
    }

    async fn find_record(&self, id: MediaId) -> Result<Option<MediaRecord>> {
        Ok(self.arena.read().await.record(&id).cloned())
    }

    async fn count_records(&self, predicate: RecordPredicate<'_>) -> Result<usize> {
        Ok(self
            .arena
            .read()
            .await
            .records()
            .filter(|record| predicate(record))
            .count())
    }

    async fn insert_record(&self, record: MediaRecord) -> Result<()> {
        debug!(id = %record.id, "Inserting record");
        self.arena.write().await.insert_record(record)
    }

    async fn update_record(&self, record: MediaRecord) -> Result<()> {
        self.arena.write().await.update_record(record)
    }

    async fn delete_record(&self, id: MediaId) -> Result<bool> {
        Ok(self.arena.write().await.delete_record(&id).is_some())
    }

    async fn upsert_bookmark(&self, bookmark: FolderBookmark) -> Result<FolderBookmark> {
        Ok(self.arena.write().await.upsert_bookmark(bookmark))
    }

    async fn delete_bookmark(&self, id: BookmarkId) -> Result<bool> {
        Ok(self.arena.write().await.delete_bookmark(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn crud_through_trait_object() {
        let catalog: Box<dyn Catalog> = Box::new(MemoryCatalog::new());
        let record = MediaRecord::new("/photos/a.jpg", None, Utc::now());
        let id = record.id;

        catalog.insert_record(record.clone()).await.unwrap();
        assert!(catalog.insert_record(record).await.is_err());
        assert_eq!(catalog.fetch_records().await.unwrap().len(), 1);

        let mut stored = catalog.find_record(id).await.unwrap().unwrap();
        stored.rating = 4;
        catalog.update_record(stored).await.unwrap();
        let rated = catalog.count_records(&|r: &MediaRecord| r.rating >= 4).await.unwrap();
        assert_eq!(rated, 1);

        assert!(catalog.delete_record(id).await.unwrap());
        assert!(!catalog.delete_record(id).await.unwrap());
    }

    #[tokio::test]
    async fn relationships_via_inherent_methods() {
        let catalog = MemoryCatalog::new();
        let record = MediaRecord::new("/photos/a.jpg", None, Utc::now());
        let id = record.id;
        catalog.insert_record(record).await.unwrap();

        let album = catalog.create_album(Album::new("Best", Utc::now())).await.unwrap();
        let tag = catalog.create_tag(Tag::new("bird")).await.unwrap();
        catalog.add_to_album(id, album).await.unwrap();
        catalog.tag_record(id, tag).await.unwrap();

        assert_eq!(catalog.album_records(album).await.len(), 1);
        assert_eq!(catalog.record_tags(id).await[0].name, "bird");

        catalog.delete_tag(tag).await.unwrap();
        assert!(catalog.record_tags(id).await.is_empty());
        assert!(catalog.remove_from_album(id, album).await);
        assert!(catalog.record_albums(id).await.is_empty());
    }
}
