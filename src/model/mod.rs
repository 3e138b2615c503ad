//! Core data models for the completion engine.
//!
//! - [`MediaItem`]: one audio file as seen by the engine (tags, images, length)
//! - [`TagMap`]: case-insensitive field map, one value per field
//! - [`CoverAsset`]: a validated cover image ready to embed
//! - [`EnrichmentResult`]: what happened to one file

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::enrichment::domain::EnrichmentError;
use crate::enrichment::strategy::CoverStrategy;

/// Canonical (uppercase) field names used by the engine.
pub mod fields {
    pub const ARTIST: &str = "ARTIST";
    pub const TITLE: &str = "TITLE";
    pub const ALBUM: &str = "ALBUM";
    pub const GENRE: &str = "GENRE";
    pub const YEAR: &str = "YEAR";
    pub const DATE: &str = "DATE";
    pub const TRACKNUMBER: &str = "TRACKNUMBER";
}

/// Field name → value map with case-insensitive keys.
///
/// Keys are stored uppercased, so `genre`, `Genre` and `GENRE` are the
/// same field. Only one value per field is retained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagMap {
    entries: BTreeMap<String, String>,
}

impl TagMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(field: &str) -> String {
        field.trim().to_uppercase()
    }

    /// Raw value of a field, if present (may be empty).
    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries.get(&Self::key(field)).map(String::as_str)
    }

    /// Trimmed value of a field, `None` if absent or blank.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.get(field).map(str::trim).filter(|v| !v.is_empty())
    }

    /// Whether the field holds a non-blank value.
    pub fn has_value(&self, field: &str) -> bool {
        self.value(field).is_some()
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, field: &str, value: impl Into<String>) -> Option<String> {
        self.entries.insert(Self::key(field), value.into())
    }

    /// Set a field only when it is absent or blank. Returns whether it was set.
    pub fn fill(&mut self, field: &str, value: impl Into<String>) -> bool {
        if self.has_value(field) {
            return false;
        }
        let value = value.into();
        if value.trim().is_empty() {
            return false;
        }
        self.insert(field, value);
        true
    }

    /// Keep the first value seen for a field (used while reading tags).
    pub fn insert_first(&mut self, field: &str, value: impl Into<String>) {
        self.entries.entry(Self::key(field)).or_insert_with(|| value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for TagMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = TagMap::new();
        for (k, v) in iter {
            map.insert(k.as_ref(), v);
        }
        map
    }
}

/// An image embedded in an audio file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    /// MIME type as stored in the file (may be empty or bogus)
    pub mime_type: String,
    pub role: ImageRole,
    pub description: Option<String>,
    pub data: Vec<u8>,
}

impl EmbeddedImage {
    /// Only `image/*` MIME types count as real artwork.
    pub fn is_image(&self) -> bool {
        self.mime_type.to_ascii_lowercase().starts_with("image/")
    }
}

/// What an embedded image depicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageRole {
    #[default]
    FrontCover,
    Other,
}

/// One audio file as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub path: PathBuf,
    pub tags: TagMap,
    pub images: Vec<EmbeddedImage>,
    /// Audio stream length in seconds
    pub duration_secs: u64,
    /// A legacy tag container (ID3v2 inside FLAC) sits next to the native one
    pub has_legacy_tags: bool,
}

impl MediaItem {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tags: TagMap::new(),
            images: Vec::new(),
            duration_secs: 0,
            has_legacy_tags: false,
        }
    }

    /// File name without its extension.
    pub fn file_stem(&self) -> Option<&str> {
        file_stem(&self.path)
    }

    /// At least one embedded image with an `image/*` MIME type.
    pub fn has_valid_cover(&self) -> bool {
        self.images.iter().any(EmbeddedImage::is_image)
    }

    pub fn has_genre(&self) -> bool {
        self.tags.has_value(fields::GENRE)
    }
}

pub(crate) fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A validated cover image.
///
/// The bytes always decode as a raster image in the canonical target
/// format (`image/jpeg`); `source_mime_type` records what was downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverAsset {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub source_mime_type: String,
    pub width: u32,
    pub height: u32,
    /// Color depth in bits per pixel
    pub depth: u8,
}

/// Terminal status of one file's enrichment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichmentStatus {
    /// Everything that was missing got filled and saved
    Completed,
    /// Some missing data was filled, some is still missing
    Partial,
    /// Nothing changed (nothing missing, or nothing found)
    Skipped,
    /// The file could not be loaded or saved
    Failed,
}

impl fmt::Display for EnrichmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Outcome of enriching a single file.
#[derive(Debug, Clone)]
pub struct EnrichmentResult {
    pub path: PathBuf,
    pub status: EnrichmentStatus,
    /// Fields that were added (never overwritten)
    pub added_fields: Vec<String>,
    /// Genre label that was added, if any
    pub genre: Option<String>,
    pub cover_embedded: bool,
    /// Strategy whose candidate supplied the embedded cover
    pub cover_strategy: Option<CoverStrategy>,
    pub legacy_removed: bool,
    /// Whether the changes were written (false for dry runs and no-ops)
    pub saved: bool,
    /// Reason for any non-completed status
    pub reason: Option<String>,
    /// Lookup errors that were swallowed along the way
    pub lookup_errors: Vec<EnrichmentError>,
}

impl EnrichmentResult {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            status: EnrichmentStatus::Skipped,
            added_fields: Vec::new(),
            genre: None,
            cover_embedded: false,
            cover_strategy: None,
            legacy_removed: false,
            saved: false,
            reason: None,
            lookup_errors: Vec::new(),
        }
    }

    /// A result for a file that could not be loaded or saved.
    pub fn failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            status: EnrichmentStatus::Failed,
            reason: Some(reason.into()),
            ..Self::new(path)
        }
    }

    /// Whether anything was added to the file.
    pub fn changed(&self) -> bool {
        !self.added_fields.is_empty() || self.cover_embedded
    }
}
