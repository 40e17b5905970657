//! Domain models for the media catalog
//!
//! Records and bookmarks always carry canonical paths (see
//! [`crate::path::canonicalize`]). Relationships between records, albums and
//! tags are not stored on the models; the catalog arena owns them as
//! id-indexed sets.

use bridge_traits::access::PortableAccessToken;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::path::{canonicalize, file_name, is_same_or_under};

// =============================================================================
// ID Types
// =============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a media record
    MediaId
);
uuid_id!(
    /// Unique identifier for a folder bookmark
    BookmarkId
);
uuid_id!(
    /// Unique identifier for an album
    AlbumId
);
uuid_id!(
    /// Unique identifier for a tag
    TagId
);

// =============================================================================
// User Marks
// =============================================================================

/// Highest star rating a record can carry.
pub const MAX_RATING: u8 = 5;

/// Pick/reject flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    #[default]
    None,
    Pick,
    Reject,
}

impl Flag {
    pub fn from_raw(value: u8) -> Self {
        match value {
            1 => Flag::Pick,
            2 => Flag::Reject,
            _ => Flag::None,
        }
    }

    pub fn as_raw(self) -> u8 {
        match self {
            Flag::None => 0,
            Flag::Pick => 1,
            Flag::Reject => 2,
        }
    }
}

/// Color label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorLabel {
    #[default]
    None,
    Red,
    Yellow,
    Green,
    Blue,
    Purple,
}

impl ColorLabel {
    pub const ALL: [ColorLabel; 6] = [
        ColorLabel::None,
        ColorLabel::Red,
        ColorLabel::Yellow,
        ColorLabel::Green,
        ColorLabel::Blue,
        ColorLabel::Purple,
    ];

    pub fn from_raw(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(ColorLabel::None)
    }

    pub fn as_raw(self) -> u8 {
        match self {
            ColorLabel::None => 0,
            ColorLabel::Red => 1,
            ColorLabel::Yellow => 2,
            ColorLabel::Green => 3,
            ColorLabel::Blue => 4,
            ColorLabel::Purple => 5,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ColorLabel::None => "None",
            ColorLabel::Red => "Red",
            ColorLabel::Yellow => "Yellow",
            ColorLabel::Green => "Green",
            ColorLabel::Blue => "Blue",
            ColorLabel::Purple => "Purple",
        }
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// EXIF-derived capture details. Filled asynchronously; every field may be
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifData {
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub lens: Option<String>,
    /// Focal length in millimetres
    pub focal_length: Option<f64>,
    /// F-number
    pub aperture: Option<f64>,
    /// Display form such as `1/250` or `2s`
    pub shutter_speed: Option<String>,
    pub iso: Option<u32>,
    pub date_taken: Option<DateTime<Utc>>,
}

impl ExifData {
    /// Formats an exposure time in seconds the way it is shown to users.
    pub fn format_shutter_speed(exposure_seconds: f64) -> Option<String> {
        if !exposure_seconds.is_finite() || exposure_seconds <= 0.0 {
            return None;
        }
        if exposure_seconds >= 1.0 {
            Some(format!("{}s", exposure_seconds as u64))
        } else {
            Some(format!("1/{}", (1.0 / exposure_seconds) as u64))
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == ExifData::default()
    }
}

/// One image or video in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRecord {
    /// Unique identifier
    pub id: MediaId,
    /// Canonical absolute source path
    pub path: PathBuf,
    /// Persisted capability token, when the file was reached through one
    pub access_token: Option<PortableAccessToken>,
    /// Display name (last path component)
    pub file_name: String,
    /// Size in bytes, 0 until enriched
    pub file_size: u64,
    pub date_created: DateTime<Utc>,
    pub date_imported: DateTime<Utc>,

    // User marks
    pub rating: u8,
    pub flag: Flag,
    pub color_label: ColorLabel,

    pub exif: ExifData,
    /// Pixel width, filled by enrichment
    pub width: Option<u32>,
    /// Pixel height, filled by enrichment
    pub height: Option<u32>,
}

impl MediaRecord {
    /// Creates a bare record for `path`. File info, EXIF and dimensions are
    /// filled later by the metadata enricher.
    pub fn new(
        path: impl AsRef<Path>,
        access_token: Option<PortableAccessToken>,
        now: DateTime<Utc>,
    ) -> Self {
        let path = canonicalize(path);
        let file_name = file_name(&path);
        Self {
            id: MediaId::new(),
            path,
            access_token,
            file_name,
            file_size: 0,
            date_created: now,
            date_imported: now,
            rating: 0,
            flag: Flag::None,
            color_label: ColorLabel::None,
            exif: ExifData::default(),
            width: None,
            height: None,
        }
    }

    /// Validate record data
    pub fn validate(&self) -> Result<(), String> {
        if !self.path.is_absolute() {
            return Err(format!("Record path {} is not absolute", self.path.display()));
        }
        if self.path != canonicalize(&self.path) {
            return Err(format!("Record path {} is not canonical", self.path.display()));
        }
        if self.file_name.trim().is_empty() {
            return Err("Record file name cannot be empty".to_string());
        }
        if self.rating > MAX_RATING {
            return Err(format!("Rating {} exceeds {}", self.rating, MAX_RATING));
        }
        Ok(())
    }

    /// Date used for chronological ordering: capture date, else import date.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.exif.date_taken.unwrap_or(self.date_imported)
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    /// True once the enrichment step recorded pixel dimensions.
    pub fn is_enriched(&self) -> bool {
        self.dimensions().is_some()
    }

    pub fn is_in_folder(&self, folder: &Path) -> bool {
        is_same_or_under(&self.path, folder)
    }

    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

/// A folder the user granted access to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderBookmark {
    pub id: BookmarkId,
    /// Canonical folder path
    pub path: PathBuf,
    pub access_token: Option<PortableAccessToken>,
    pub date_imported: DateTime<Utc>,
}

impl FolderBookmark {
    pub fn new(
        path: impl AsRef<Path>,
        access_token: Option<PortableAccessToken>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BookmarkId::new(),
            path: canonicalize(path),
            access_token,
            date_imported: now,
        }
    }

    /// True when this bookmark grants access to `path`.
    pub fn covers(&self, path: &Path) -> bool {
        is_same_or_under(path, &self.path)
    }

    /// The authoritative bookmark for `target`: the one whose folder is the
    /// longest prefix of (or equal to) the target.
    pub fn best_match<'a>(
        bookmarks: &'a [FolderBookmark],
        target: &Path,
    ) -> Option<&'a FolderBookmark> {
        let target = canonicalize(target);
        bookmarks
            .iter()
            .filter(|bookmark| bookmark.covers(&target))
            .max_by_key(|bookmark| bookmark.path.components().count())
    }
}

/// User album, optionally nested or rule-driven
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    pub date_created: DateTime<Utc>,
    pub is_smart: bool,
    pub smart_rule: Option<String>,
    pub parent_id: Option<AlbumId>,
}

impl Album {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: AlbumId::new(),
            name: name.into(),
            date_created: now,
            is_smart: false,
            smart_rule: None,
            parent_id: None,
        }
    }

    pub fn smart(name: impl Into<String>, rule: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            is_smart: true,
            smart_rule: Some(rule.into()),
            ..Self::new(name, now)
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Album name cannot be empty".to_string());
        }
        if self.is_smart && self.smart_rule.as_deref().map_or(true, str::is_empty) {
            return Err("Smart album requires a rule".to_string());
        }
        if self.parent_id == Some(self.id) {
            return Err("Album cannot be its own parent".to_string());
        }
        Ok(())
    }
}

/// Default tag color (system blue).
pub const DEFAULT_TAG_COLOR: &str = "#007AFF";

/// Free-form keyword tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    /// `#RRGGBB`
    pub color_hex: String,
}

impl Tag {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TagId::new(),
            name: name.into(),
            color_hex: DEFAULT_TAG_COLOR.to_string(),
        }
    }

    pub fn with_color(mut self, color_hex: impl Into<String>) -> Self {
        self.color_hex = color_hex.into();
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Tag name cannot be empty".to_string());
        }
        let hex = self.color_hex.strip_prefix('#').unwrap_or("");
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!("Invalid tag color {}", self.color_hex));
        }
        Ok(())
    }
}
