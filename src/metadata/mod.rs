//! Audio file tag reading and writing.
//!
//! Uses the lofty crate for format-independent metadata access. The engine
//! only talks to the [`TagStore`] trait; [`LoftyTagStore`] is the production
//! implementation.
//!
//! # Features
//! - Case-insensitive field reads (native keys are uppercased)
//! - Upsert-only saves: only fields whose value differs from the file are
//!   rewritten, so repeated values (two `ARTIST` comments) survive
//! - `YEAR`/`DATE` mirror on save
//! - Manual writes ([`write_fields`], [`set_cover`])

pub mod flac;
pub mod legacy;

use lofty::config::WriteOptions;
use lofty::file::{AudioFile, FileType, TaggedFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{ItemKey, ItemValue, Tag, TagExt, TagItem, TagType};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use crate::enrichment::coverart::normalize;
use crate::error::{Error, Result};
use crate::model::{CoverAsset, EmbeddedImage, ImageRole, MediaItem, TagMap, fields};

pub use legacy::{BuiltinRemover, CommandRemover, LegacyTagRemover};

/// Persistent tag storage for one audio file at a time.
///
/// `load` and `save` are blocking; async callers run them on the blocking
/// thread pool.
pub trait TagStore: Send + Sync {
    /// Read a file's tags, images and stream properties.
    fn load(&self, path: &Path) -> Result<MediaItem>;

    /// Write an item's tags and images back to its file.
    fn save(&self, item: &MediaItem) -> Result<()>;

    /// Drop every embedded image (in memory).
    fn clear_images(&self, item: &mut MediaItem) {
        item.images.clear();
    }

    /// Embed a cover (in memory). Front covers go first.
    fn add_image(&self, item: &mut MediaItem, asset: &CoverAsset, role: ImageRole) {
        let image = EmbeddedImage {
            mime_type: asset.mime_type.clone(),
            role,
            description: None,
            data: asset.data.clone(),
        };
        match role {
            ImageRole::FrontCover => item.images.insert(0, image),
            ImageRole::Other => item.images.push(image),
        }
    }
}

/// Fields to write on save, with `YEAR` and `DATE` mirroring each other.
///
/// A missing `YEAR` is taken from the leading four digits of `DATE`; a
/// missing `DATE` is copied from `YEAR`. Present values are never changed.
pub fn mirrored_fields(tags: &TagMap) -> TagMap {
    let mut out = tags.clone();

    if !out.has_value(fields::YEAR)
        && let Some(year) = tags.value(fields::DATE).and_then(leading_year)
    {
        out.insert(fields::YEAR, year);
    }

    if !out.has_value(fields::DATE)
        && let Some(year) = tags.value(fields::YEAR)
    {
        out.insert(fields::DATE, year);
    }

    out
}

fn leading_year(date: &str) -> Option<String> {
    let digits: String = date.trim().chars().take(4).collect();
    (digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit())).then_some(digits)
}

/// lofty-backed [`TagStore`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagStore;

impl LoftyTagStore {
    pub fn new() -> Self {
        Self
    }
}

fn read_tagged(path: &Path) -> Result<TaggedFile> {
    if !path.exists() {
        return Err(Error::not_found(path));
    }
    Probe::open(path)
        .map_err(|e| Error::tag_store(path, format!("Failed to open file: {}", e)))?
        .read()
        .map_err(|e| Error::tag_store(path, format!("Failed to read tags: {}", e)))
}

/// Native key of a tag item, uppercased.
fn field_name(item: &TagItem, tag_type: TagType) -> Option<String> {
    item.key()
        .map_key(tag_type, true)
        .map(|k| k.trim().to_uppercase())
        .filter(|k| !k.is_empty())
}

fn embedded_image(picture: &Picture) -> EmbeddedImage {
    EmbeddedImage {
        mime_type: picture
            .mime_type()
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        role: if picture.pic_type() == PictureType::CoverFront {
            ImageRole::FrontCover
        } else {
            ImageRole::Other
        },
        description: picture.description().map(String::from),
        data: picture.data().to_vec(),
    }
}

fn to_picture(image: &EmbeddedImage) -> Picture {
    let pic_type = if image.role == ImageRole::FrontCover {
        PictureType::CoverFront
    } else {
        PictureType::Other
    };
    let mime_type = (!image.mime_type.is_empty()).then(|| MimeType::from_str(&image.mime_type));
    Picture::new_unchecked(
        pic_type,
        mime_type,
        image.description.clone(),
        image.data.clone(),
    )
}

/// Text fields of a tag, first value per field.
fn text_fields(tag: &Tag, tag_type: TagType) -> TagMap {
    let mut map = TagMap::new();
    for tag_item in tag.items() {
        if let (Some(name), Some(text)) = (field_name(tag_item, tag_type), tag_item.value().text()) {
            map.insert_first(&name, text);
        }
    }
    map
}

/// Replace a field's value, reusing the key already present in the tag.
fn set_text(tag: &mut Tag, tag_type: TagType, field: &str, value: &str) {
    let existing = tag
        .items()
        .find(|item| field_name(item, tag_type).as_deref() == Some(field))
        .map(|item| item.key().clone());

    tag.retain(|item| field_name(item, tag_type).as_deref() != Some(field));

    let key = existing.unwrap_or_else(|| ItemKey::from_key(tag_type, field));
    tag.insert_unchecked(TagItem::new(key, ItemValue::Text(value.to_string())));
}

impl TagStore for LoftyTagStore {
    fn load(&self, path: &Path) -> Result<MediaItem> {
        let tagged_file = read_tagged(path)?;
        let tag_type = tagged_file.primary_tag_type();

        let mut item = MediaItem::new(path);
        item.duration_secs = tagged_file.properties().duration().as_secs();
        item.has_legacy_tags = tagged_file.file_type() == FileType::Flac
            && tagged_file.tag(TagType::Id3v2).is_some();

        if let Some(tag) = tagged_file.tag(tag_type) {
            item.tags = text_fields(tag, tag_type);
            item.images = tag.pictures().iter().map(embedded_image).collect();
        }

        tracing::debug!(
            path = %path.display(),
            fields = item.tags.len(),
            images = item.images.len(),
            legacy = item.has_legacy_tags,
            "Loaded tags"
        );

        Ok(item)
    }

    fn save(&self, item: &MediaItem) -> Result<()> {
        let path = item.path.as_path();
        let mut tagged_file = read_tagged(path)?;
        let tag_type = tagged_file.primary_tag_type();
        let is_flac = tagged_file.file_type() == FileType::Flac;

        if tagged_file.tag(tag_type).is_none() {
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged_file.tag_mut(tag_type).ok_or_else(|| {
            Error::tag_store(path, format!("File does not support {:?} tags", tag_type))
        })?;

        let on_disk = text_fields(tag, tag_type);
        let mut written = Vec::new();
        for (field, value) in mirrored_fields(&item.tags).iter() {
            if on_disk.get(field) != Some(value) {
                set_text(tag, tag_type, field, value);
                written.push(field.to_string());
            }
        }

        // Only rebuild pictures when they changed, so unknown picture types survive
        let current: Vec<EmbeddedImage> = tag.pictures().iter().map(embedded_image).collect();
        let pictures_changed = current != item.images;
        if pictures_changed {
            while tag.picture_count() > 0 {
                tag.remove_picture(0);
            }
            for image in &item.images {
                tag.push_picture(to_picture(image));
            }
        }

        if written.is_empty() && !pictures_changed {
            tracing::debug!(path = %path.display(), "Tags already up to date");
            return Ok(());
        }

        if is_flac {
            flac::ensure_trailing_padding(path)?;
        }

        match catch_unwind(AssertUnwindSafe(|| tag.save_to_path(path, WriteOptions::default()))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                return Err(Error::tag_store(path, format!("Failed to write tags: {}", e)));
            }
            Err(_) => {
                return Err(Error::tag_store(path, "Tag writer panicked on this file layout"));
            }
        }

        tracing::debug!(path = %path.display(), fields = ?written, pictures = pictures_changed, "Saved tags");
        Ok(())
    }
}

/// Overwrite fields on a file (manual edit).
///
/// Keys are case-insensitive. Setting `YEAR` also sets `DATE` to the same
/// value, and setting `DATE` sets `YEAR` to its leading year, unless both
/// are given. Blank values are ignored.
pub fn write_fields(
    store: &dyn TagStore,
    path: &Path,
    updates: &[(String, String)],
) -> Result<MediaItem> {
    let mut item = store.load(path)?;
    let given: TagMap = updates
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.as_str(), v.trim().to_string()))
        .collect();

    for (field, value) in given.iter() {
        item.tags.insert(field, value);
    }

    match (given.value(fields::YEAR), given.value(fields::DATE)) {
        (Some(year), None) => {
            item.tags.insert(fields::DATE, year);
        }
        (None, Some(date)) => {
            if let Some(year) = leading_year(date) {
                item.tags.insert(fields::YEAR, year);
            }
        }
        _ => {}
    }

    store.save(&item)?;
    tracing::info!(path = %path.display(), fields = given.len(), "Wrote tags");
    Ok(item)
}

/// Make an image the file's only cover (manual pick).
///
/// The image is validated and transcoded to JPEG first.
pub fn set_cover(store: &dyn TagStore, path: &Path, data: Vec<u8>) -> Result<CoverAsset> {
    let source_mime = image::guess_format(&data)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string());
    let asset = normalize(data, &source_mime)?;

    let mut item = store.load(path)?;
    store.clear_images(&mut item);
    store.add_image(&mut item, &asset, ImageRole::FrontCover);
    store.save(&item)?;

    tracing::info!(
        path = %path.display(),
        width = asset.width,
        height = asset.height,
        "Replaced cover"
    );
    Ok(asset)
}
