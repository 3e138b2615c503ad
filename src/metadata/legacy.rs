//! Removal of legacy ID3v2 blocks from FLAC files.
//!
//! Some taggers prepend an ID3v2 tag to FLAC files. Players disagree on
//! which container wins, so it is stripped before enrichment. Two removers:
//! - [`CommandRemover`]: runs `metaflac --remove --block-type=ID3 <path>`
//! - [`BuiltinRemover`]: strips the block in-process, first carrying any
//!   missing title/artist/album/track/genre over to the Vorbis comments

use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{Accessor, TagType};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{LoftyTagStore, TagStore, flac};
use crate::config::{LegacyConfig, RemoverKind};
use crate::error::{Error, Result, ResultExt};
use crate::model::{TagMap, fields};

/// Strips a legacy tag container from a file.
pub trait LegacyTagRemover: Send + Sync {
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Build the remover selected in the config.
pub fn from_config(config: &LegacyConfig) -> Box<dyn LegacyTagRemover> {
    match config.remover {
        RemoverKind::Command => Box::new(CommandRemover::new(&config.program, &config.args)),
        RemoverKind::Builtin => Box::new(BuiltinRemover::new()),
    }
}

/// Runs an external program with the file path as last argument.
#[derive(Debug, Clone)]
pub struct CommandRemover {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandRemover {
    pub fn new(program: impl Into<PathBuf>, args: &[String]) -> Self {
        Self {
            program: program.into(),
            args: args.to_vec(),
        }
    }
}

impl LegacyTagRemover for CommandRemover {
    fn remove(&self, path: &Path) -> Result<()> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .output()
            .with_context(format!("Failed to run {}", self.program.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tag_store(
                path,
                format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            ));
        }

        tracing::debug!(path = %path.display(), program = %self.program.display(), "Removed legacy tags");
        Ok(())
    }
}

/// In-process remover.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinRemover;

impl BuiltinRemover {
    pub fn new() -> Self {
        Self
    }
}

/// Fields worth keeping from the ID3v2 block.
fn legacy_fields(path: &Path) -> Result<TagMap> {
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::tag_store(path, format!("Failed to open file: {}", e)))?
        .read()
        .map_err(|e| Error::tag_store(path, format!("Failed to read tags: {}", e)))?;

    let mut found = TagMap::new();
    if let Some(id3) = tagged_file.tag(TagType::Id3v2) {
        if let Some(title) = id3.title() {
            found.fill(fields::TITLE, title.to_string());
        }
        if let Some(artist) = id3.artist() {
            found.fill(fields::ARTIST, artist.to_string());
        }
        if let Some(album) = id3.album() {
            found.fill(fields::ALBUM, album.to_string());
        }
        if let Some(track) = id3.track() {
            found.fill(fields::TRACKNUMBER, track.to_string());
        }
        if let Some(genre) = id3.genre() {
            found.fill(fields::GENRE, genre.to_string());
        }
    }
    Ok(found)
}

/// Length of a leading ID3v2 tag, header and footer included.
pub fn id3v2_len(data: &[u8]) -> Option<usize> {
    if data.len() < 10 || &data[..3] != b"ID3" {
        return None;
    }
    // Size is a 28-bit syncsafe integer
    let size = data[6..10]
        .iter()
        .try_fold(0usize, |acc, b| (b & 0x80 == 0).then(|| (acc << 7) | *b as usize))?;
    let footer = if data[5] & 0x10 != 0 { 10 } else { 0 };
    Some(10 + size + footer)
}

/// Remove every leading ID3v2 tag and return the FLAC stream behind it.
pub fn strip_id3v2(data: &[u8]) -> Option<&[u8]> {
    let mut rest = data;
    while let Some(len) = id3v2_len(rest) {
        rest = rest.get(len..)?;
    }
    (rest.len() < data.len() && rest.starts_with(b"fLaC")).then_some(rest)
}

impl LegacyTagRemover for BuiltinRemover {
    fn remove(&self, path: &Path) -> Result<()> {
        let carried = legacy_fields(path)?;

        let data =
            std::fs::read(path).with_context(format!("Failed to read {}", path.display()))?;
        let stream = strip_id3v2(&data)
            .ok_or_else(|| Error::tag_store(path, "No leading ID3v2 block in front of the FLAC stream"))?;

        flac::replace_file(path, stream)?;

        if !carried.is_empty() {
            let store = LoftyTagStore::new();
            let mut item = store.load(path)?;
            let mut changed = false;
            for (field, value) in carried.iter() {
                changed |= item.tags.fill(field, value);
            }
            if changed {
                store.save(&item)?;
            }
        }

        tracing::debug!(path = %path.display(), carried = carried.len(), "Stripped legacy ID3v2 block");
        Ok(())
    }
}
