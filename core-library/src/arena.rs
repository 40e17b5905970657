//! In-memory catalog arena.
//!
//! Entities live in id-keyed maps. Many-to-many relationships (record ↔
//! album, record ↔ tag) and the album hierarchy are stored as pairs of
//! id-indexed sets that are only ever mutated together by the `link_*` /
//! `unlink_*` methods, so both directions stay consistent.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{LibraryError, Result};
use crate::models::{Album, AlbumId, BookmarkId, FolderBookmark, MediaId, MediaRecord, Tag, TagId};
use crate::path::canonicalize;

/// Two-sided many-to-many relationship between `L` and `R` ids.
#[derive(Debug)]
struct Relation<L, R> {
    forward: HashMap<L, BTreeSet<R>>,
    backward: HashMap<R, BTreeSet<L>>,
}

impl<L, R> Default for Relation<L, R> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            backward: HashMap::new(),
        }
    }
}

impl<L, R> Relation<L, R>
where
    L: Copy + Eq + std::hash::Hash + Ord,
    R: Copy + Eq + std::hash::Hash + Ord,
{
    fn link(&mut self, left: L, right: R) -> bool {
        let added = self.forward.entry(left).or_default().insert(right);
        self.backward.entry(right).or_default().insert(left);
        added
    }

    fn unlink(&mut self, left: L, right: R) -> bool {
        let removed = remove_from(&mut self.forward, &left, &right);
        remove_from(&mut self.backward, &right, &left);
        removed
    }

    fn right_of(&self, left: &L) -> Vec<R> {
        self.forward
            .get(left)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn left_of(&self, right: &R) -> Vec<L> {
        self.backward
            .get(right)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn remove_left(&mut self, left: &L) {
        if let Some(rights) = self.forward.remove(left) {
            for right in rights {
                remove_from(&mut self.backward, &right, left);
            }
        }
    }

    fn remove_right(&mut self, right: &R) {
        if let Some(lefts) = self.backward.remove(right) {
            for left in lefts {
                remove_from(&mut self.forward, &left, right);
            }
        }
    }
}

fn remove_from<K, V>(map: &mut HashMap<K, BTreeSet<V>>, key: &K, value: &V) -> bool
where
    K: Eq + std::hash::Hash,
    V: Ord,
{
    let Some(set) = map.get_mut(key) else {
        return false;
    };
    let removed = set.remove(value);
    if set.is_empty() {
        map.remove(key);
    }
    removed
}

/// Owner of every catalog entity and relationship.
#[derive(Debug, Default)]
pub struct LibraryArena {
    records: HashMap<MediaId, MediaRecord>,
    by_path: HashMap<PathBuf, MediaId>,
    bookmarks: HashMap<BookmarkId, FolderBookmark>,
    albums: HashMap<AlbumId, Album>,
    tags: HashMap<TagId, Tag>,
    album_members: Relation<AlbumId, MediaId>,
    tag_members: Relation<TagId, MediaId>,
    album_children: Relation<AlbumId, AlbumId>,
}

impl LibraryArena {
    pub fn new() -> Self {
        Self::default()
    }

    // ---------------------------------------------------------------------
    // Records
    // ---------------------------------------------------------------------

    pub fn record(&self, id: &MediaId) -> Option<&MediaRecord> {
        self.records.get(id)
    }

    pub fn record_by_path(&self, path: &Path) -> Option<&MediaRecord> {
        self.by_path
            .get(&canonicalize(path))
            .and_then(|id| self.records.get(id))
    }

    pub fn records(&self) -> impl Iterator<Item = &MediaRecord> {
        self.records.values()
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Inserts a new record. At most one record may exist per canonical path.
    pub fn insert_record(&mut self, mut record: MediaRecord) -> Result<()> {
        record.path = canonicalize(&record.path);
        record
            .validate()
            .map_err(|message| LibraryError::invalid("record", message))?;
        if self.records.contains_key(&record.id) {
            return Err(LibraryError::invalid(
                "id",
                format!("record {} already exists", record.id),
            ));
        }
        if self.by_path.contains_key(&record.path) {
            return Err(LibraryError::DuplicatePath(record.path));
        }

        self.by_path.insert(record.path.clone(), record.id);
        self.records.insert(record.id, record);
        Ok(())
    }

    /// Replaces a stored record. The path is canonicalized before the
    /// duplicate check.
    pub fn update_record(&mut self, mut record: MediaRecord) -> Result<()> {
        record.path = canonicalize(&record.path);
        record
            .validate()
            .map_err(|message| LibraryError::invalid("record", message))?;
        let existing_path = match self.records.get(&record.id) {
            Some(existing) => existing.path.clone(),
            None => return Err(LibraryError::not_found("MediaRecord", record.id)),
        };

        if existing_path != record.path {
            if self.by_path.contains_key(&record.path) {
                return Err(LibraryError::DuplicatePath(record.path));
            }
            self.by_path.remove(&existing_path);
            self.by_path.insert(record.path.clone(), record.id);
        }
        self.records.insert(record.id, record);
        Ok(())
    }

    /// Deletes a record together with its album and tag memberships.
    pub fn delete_record(&mut self, id: &MediaId) -> Option<MediaRecord> {
        let record = self.records.remove(id)?;
        self.by_path.remove(&record.path);
        self.album_members.remove_right(id);
        self.tag_members.remove_right(id);
        Some(record)
    }

    // ---------------------------------------------------------------------
    // Bookmarks
    // ---------------------------------------------------------------------

    pub fn bookmarks(&self) -> impl Iterator<Item = &FolderBookmark> {
        self.bookmarks.values()
    }

    /// Inserts or refreshes the bookmark for a canonical folder path.
    ///
    /// When a bookmark for the path exists its id is kept and its token and
    /// timestamp are replaced.
    pub fn upsert_bookmark(&mut self, mut bookmark: FolderBookmark) -> FolderBookmark {
        bookmark.path = canonicalize(&bookmark.path);
        let existing = self
            .bookmarks
            .values()
            .find(|candidate| candidate.path == bookmark.path)
            .map(|candidate| candidate.id);

        if let Some(id) = existing {
            bookmark.id = id;
        }
        self.bookmarks.insert(bookmark.id, bookmark.clone());
        bookmark
    }

    pub fn delete_bookmark(&mut self, id: &BookmarkId) -> Option<FolderBookmark> {
        self.bookmarks.remove(id)
    }

    // ---------------------------------------------------------------------
    // Albums
    // ---------------------------------------------------------------------

    pub fn album(&self, id: &AlbumId) -> Option<&Album> {
        self.albums.get(id)
    }

    pub fn albums(&self) -> impl Iterator<Item = &Album> {
        self.albums.values()
    }

    pub fn create_album(&mut self, album: Album) -> Result<AlbumId> {
        album
            .validate()
            .map_err(|message| LibraryError::invalid("album", message))?;
        if let Some(parent) = album.parent_id {
            if !self.albums.contains_key(&parent) {
                return Err(LibraryError::not_found("Album", parent));
            }
            self.album_children.link(parent, album.id);
        }
        let id = album.id;
        self.albums.insert(id, album);
        Ok(id)
    }

    /// Moves `child` under `parent`, or to the top level with `None`.
    pub fn set_album_parent(&mut self, child: AlbumId, parent: Option<AlbumId>) -> Result<()> {
        if !self.albums.contains_key(&child) {
            return Err(LibraryError::not_found("Album", child));
        }
        if let Some(parent) = parent {
            if !self.albums.contains_key(&parent) {
                return Err(LibraryError::not_found("Album", parent));
            }
            if parent == child || self.is_album_ancestor(child, parent) {
                return Err(LibraryError::invalid(
                    "parent_id",
                    "album hierarchy cannot contain cycles",
                ));
            }
        }

        let previous = self.albums.get(&child).and_then(|album| album.parent_id);
        if let Some(previous) = previous {
            self.album_children.unlink(previous, child);
        }
        if let Some(parent) = parent {
            self.album_children.link(parent, child);
        }
        if let Some(album) = self.albums.get_mut(&child) {
            album.parent_id = parent;
        }
        Ok(())
    }

    fn is_album_ancestor(&self, ancestor: AlbumId, mut album: AlbumId) -> bool {
        while let Some(parent) = self.albums.get(&album).and_then(|a| a.parent_id) {
            if parent == ancestor {
                return true;
            }
            album = parent;
        }
        false
    }

    pub fn album_children(&self, id: &AlbumId) -> Vec<AlbumId> {
        self.album_children.right_of(id)
    }

    /// Deletes an album. Its children move to the top level and its
    /// memberships are dropped; member records are untouched.
    pub fn delete_album(&mut self, id: &AlbumId) -> Option<Album> {
        let album = self.albums.remove(id)?;
        for child in self.album_children.right_of(id) {
            if let Some(child_album) = self.albums.get_mut(&child) {
                child_album.parent_id = None;
            }
        }
        self.album_children.remove_left(id);
        self.album_children.remove_right(id);
        self.album_members.remove_left(id);
        Some(album)
    }

    pub fn link_album(&mut self, record: MediaId, album: AlbumId) -> Result<bool> {
        self.ensure_record(&record)?;
        if !self.albums.contains_key(&album) {
            return Err(LibraryError::not_found("Album", album));
        }
        Ok(self.album_members.link(album, record))
    }

    pub fn unlink_album(&mut self, record: MediaId, album: AlbumId) -> bool {
        self.album_members.unlink(album, record)
    }

    pub fn album_records(&self, album: &AlbumId) -> Vec<MediaId> {
        self.album_members.right_of(album)
    }

    pub fn record_albums(&self, record: &MediaId) -> Vec<AlbumId> {
        self.album_members.left_of(record)
    }

    // ---------------------------------------------------------------------
    // Tags
    // ---------------------------------------------------------------------

    pub fn tag(&self, id: &TagId) -> Option<&Tag> {
        self.tags.get(id)
    }

    pub fn tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.values()
    }

    pub fn create_tag(&mut self, tag: Tag) -> Result<TagId> {
        tag.validate()
            .map_err(|message| LibraryError::invalid("tag", message))?;
        let id = tag.id;
        self.tags.insert(id, tag);
        Ok(id)
    }

    pub fn delete_tag(&mut self, id: &TagId) -> Option<Tag> {
        let tag = self.tags.remove(id)?;
        self.tag_members.remove_left(id);
        Some(tag)
    }

    pub fn link_tag(&mut self, record: MediaId, tag: TagId) -> Result<bool> {
        self.ensure_record(&record)?;
        if !self.tags.contains_key(&tag) {
            return Err(LibraryError::not_found("Tag", tag));
        }
        Ok(self.tag_members.link(tag, record))
    }

    pub fn unlink_tag(&mut self, record: MediaId, tag: TagId) -> bool {
        self.tag_members.unlink(tag, record)
    }

    pub fn tag_records(&self, tag: &TagId) -> Vec<MediaId> {
        self.tag_members.right_of(tag)
    }

    pub fn record_tags(&self, record: &MediaId) -> Vec<TagId> {
        self.tag_members.left_of(record)
    }

    fn ensure_record(&self, id: &MediaId) -> Result<()> {
        if self.records.contains_key(id) {
            Ok(())
        } else {
            Err(LibraryError::not_found("MediaRecord", id))
        }
    }
}
