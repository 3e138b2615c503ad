//! Test utilities and fixtures for flac-minder tests.
//!
//! This module provides an in-memory tag store, a scriptable legacy
//! remover, and byte-level fixtures (a minimal FLAC stream, an ID3v2
//! block, small images) to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{MemoryTagStore, tagged_item};
//!
//! let store = MemoryTagStore::new();
//! store.insert(tagged_item("/music/a.flac", &[("ARTIST", "Queen")]));
//! ```

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use crate::error::{Error, Result};
use crate::metadata::{LegacyTagRemover, TagStore};
use crate::model::{MediaItem, fields};

/// Creates a MediaItem at `path` with the given tags.
pub fn tagged_item(path: &str, tags: &[(&str, &str)]) -> MediaItem {
    let mut item = MediaItem::new(path);
    item.tags = tags.iter().copied().collect();
    item.duration_secs = 180;
    item
}

/// [`TagStore`] keeping items in a map.
///
/// Saves can be made to fail per path, and are counted.
#[derive(Default)]
pub struct MemoryTagStore {
    items: Mutex<HashMap<PathBuf, MediaItem>>,
    failing: Mutex<HashSet<PathBuf>>,
    saves: AtomicUsize,
}

impl MemoryTagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, item: MediaItem) {
        self.items.lock().unwrap().insert(item.path.clone(), item);
    }

    pub fn get(&self, path: &Path) -> Option<MediaItem> {
        self.items.lock().unwrap().get(path).cloned()
    }

    /// Make every save of `path` fail.
    pub fn fail_saves_for(&self, path: &Path) {
        self.failing.lock().unwrap().insert(path.to_path_buf());
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    fn update(&self, path: &Path, f: impl FnOnce(&mut MediaItem)) {
        if let Some(item) = self.items.lock().unwrap().get_mut(path) {
            f(item);
        }
    }
}

impl TagStore for MemoryTagStore {
    fn load(&self, path: &Path) -> Result<MediaItem> {
        self.get(path).ok_or_else(|| Error::not_found(path))
    }

    fn save(&self, item: &MediaItem) -> Result<()> {
        if self.failing.lock().unwrap().contains(&item.path) {
            return Err(Error::tag_store(&item.path, "disk full"));
        }
        self.insert(item.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Legacy remover acting on a [`MemoryTagStore`].
///
/// On success it clears the item's legacy flag and can rewrite its artist,
/// the way a real removal exposes the native tags.
pub struct MockRemover {
    store: Arc<MemoryTagStore>,
    artist: Mutex<Option<String>>,
    failing: Mutex<bool>,
    calls: Mutex<Vec<PathBuf>>,
}

impl MockRemover {
    pub fn new(store: Arc<MemoryTagStore>) -> Self {
        Self {
            store,
            artist: Mutex::new(None),
            failing: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Artist the native tags hold once the legacy block is gone.
    pub fn set_artist(&self, artist: &str) {
        *self.artist.lock().unwrap() = Some(artist.to_string());
    }

    pub fn fail(&self) {
        *self.failing.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

impl LegacyTagRemover for MockRemover {
    fn remove(&self, path: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        if *self.failing.lock().unwrap() {
            return Err(Error::tag_store(path, "metaflac exited with 1"));
        }
        let artist = self.artist.lock().unwrap().clone();
        self.store.update(path, |item| {
            item.has_legacy_tags = false;
            if let Some(artist) = artist {
                item.tags.insert(fields::ARTIST, artist);
            }
        });
        Ok(())
    }
}

/// Bytes standing in for the first audio frame.
const FRAME_BYTES: [u8; 16] = [
    0xFF, 0xF8, 0x69, 0x08, 0x00, 0x00, 0x8A, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Metadata block header: last flag, block type, 24-bit length.
fn block_header(kind: u8, last: bool, len: usize) -> [u8; 4] {
    let len = (len as u32).to_be_bytes();
    [if last { 0x80 | kind } else { kind }, len[1], len[2], len[3]]
}

/// STREAMINFO body: 44.1 kHz, stereo, 16 bit, 44100 samples.
fn stream_info() -> Vec<u8> {
    let mut body = Vec::with_capacity(34);
    body.extend_from_slice(&4096u16.to_be_bytes()); // min block size
    body.extend_from_slice(&4096u16.to_be_bytes()); // max block size
    body.extend_from_slice(&[0, 0, 0]); // min frame size
    body.extend_from_slice(&[0, 0, 0]); // max frame size

    // sample rate (20) | channels - 1 (3) | bits per sample - 1 (5) | total samples (36)
    let packed: u64 = (44_100u64 << 44) | (1 << 41) | (15 << 36) | 44_100;
    body.extend_from_slice(&packed.to_be_bytes());
    body.extend_from_slice(&[0u8; 16]); // MD5
    body
}

/// A FLAC stream laid out the way encoders write it: STREAMINFO, a
/// VORBIS_COMMENT block holding `comments` (`KEY=value`, repeats allowed),
/// trailing PADDING, then audio.
pub fn flac_with_comments(comments: &[&str]) -> Vec<u8> {
    let vendor = b"reference libFLAC 1.4.3 20230623";
    let mut body = (vendor.len() as u32).to_le_bytes().to_vec();
    body.extend_from_slice(vendor);
    body.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for comment in comments {
        body.extend_from_slice(&(comment.len() as u32).to_le_bytes());
        body.extend_from_slice(comment.as_bytes());
    }

    let mut data = b"fLaC".to_vec();
    let info = stream_info();
    data.extend_from_slice(&block_header(0, false, info.len()));
    data.extend_from_slice(&info);
    data.extend_from_slice(&block_header(4, false, body.len()));
    data.extend_from_slice(&body);
    data.extend_from_slice(&block_header(1, true, 64));
    data.extend_from_slice(&[0u8; 64]);
    data.extend_from_slice(&FRAME_BYTES);
    data
}

/// A FLAC stream with no tags.
pub fn minimal_flac() -> Vec<u8> {
    flac_with_comments(&[])
}

/// STREAMINFO as the only metadata block, straight into audio.
pub fn bare_flac() -> Vec<u8> {
    let mut data = b"fLaC".to_vec();
    let info = stream_info();
    data.extend_from_slice(&block_header(0, true, info.len()));
    data.extend_from_slice(&info);
    data.extend_from_slice(&FRAME_BYTES);
    data
}

/// An ID3v2.4 tag holding a single `TIT2` frame ("Legacy Title").
pub fn id3v2_block() -> Vec<u8> {
    let title = b"Legacy Title";

    let mut frame = b"TIT2".to_vec();
    let frame_size = (1 + title.len()) as u8;
    frame.extend_from_slice(&[0, 0, 0, frame_size]); // syncsafe, < 128
    frame.extend_from_slice(&[0, 0]); // flags
    frame.push(3); // UTF-8
    frame.extend_from_slice(title);

    let mut tag = b"ID3\x04\x00\x00".to_vec();
    tag.extend_from_slice(&[0, 0, 0, frame.len() as u8]);
    tag.extend_from_slice(&frame);
    tag
}

fn encode(format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_pixel(4, 4, Rgb([10, 120, 200]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), format)
        .expect("encode test image");
    out
}

/// A small valid JPEG.
pub fn jpeg_bytes() -> Vec<u8> {
    encode(ImageFormat::Jpeg)
}

/// A small valid PNG.
pub fn png_bytes() -> Vec<u8> {
    encode(ImageFormat::Png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryTagStore::new();
        store.insert(tagged_item("/a.flac", &[("artist", "Queen")]));

        let mut item = store.load(Path::new("/a.flac")).unwrap();
        assert_eq!(item.tags.get("ARTIST"), Some("Queen"));

        item.tags.insert("GENRE", "Rock");
        store.save(&item).unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(
            store.get(Path::new("/a.flac")).unwrap().tags.get("GENRE"),
            Some("Rock")
        );
    }

    #[test]
    fn test_memory_store_failures() {
        let store = MemoryTagStore::new();
        assert!(store.load(Path::new("/missing.flac")).is_err());

        store.insert(tagged_item("/a.flac", &[]));
        store.fail_saves_for(Path::new("/a.flac"));
        let item = store.load(Path::new("/a.flac")).unwrap();
        assert!(store.save(&item).unwrap_err().is_tag_store());
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_mock_remover_updates_store() {
        let store = Arc::new(MemoryTagStore::new());
        let mut item = tagged_item("/a.flac", &[("ARTIST", "Old")]);
        item.has_legacy_tags = true;
        store.insert(item);

        let remover = MockRemover::new(Arc::clone(&store));
        remover.set_artist("New");
        remover.remove(Path::new("/a.flac")).unwrap();

        let after = store.get(Path::new("/a.flac")).unwrap();
        assert!(!after.has_legacy_tags);
        assert_eq!(after.tags.get("ARTIST"), Some("New"));
    }

    #[test]
    fn test_fixtures_are_well_formed() {
        assert_eq!(bare_flac().len(), 4 + 4 + 34 + 16);
        assert!(minimal_flac().starts_with(b"fLaC"));
        assert_eq!(image::guess_format(&jpeg_bytes()).unwrap(), ImageFormat::Jpeg);
        assert_eq!(image::guess_format(&png_bytes()).unwrap(), ImageFormat::Png);

        let id3 = id3v2_block();
        assert_eq!(
            crate::metadata::legacy::id3v2_len(&id3),
            Some(id3.len())
        );
    }
}
