//! FLAC metadata block layout.
//!
//! lofty rewrites the Vorbis comment and picture blocks in place, but only
//! handles a metadata chain that ends in a PADDING block. Files whose chain
//! ends anywhere else get a padding block appended before any tag write.

use std::path::Path;

use super::legacy::id3v2_len;
use crate::error::{Result, ResultExt};

pub const STREAMINFO: u8 = 0;
pub const PADDING: u8 = 1;

/// Padding appended when a file's metadata doesn't end in one
pub const DEFAULT_PADDING: u32 = 1024;

const MAX_BLOCK_LEN: u32 = 0xFF_FFFF;

/// One metadata block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub kind: u8,
    pub last: bool,
    /// Offset of the 4-byte header in the file
    pub offset: usize,
    /// Body length, header excluded
    pub len: usize,
}

impl BlockHeader {
    fn end(&self) -> usize {
        self.offset + 4 + self.len
    }
}

/// Offset of the `fLaC` marker, past any leading ID3v2 tags.
fn stream_start(data: &[u8]) -> Option<usize> {
    let mut offset = 0;
    while let Some(len) = data.get(offset..).and_then(id3v2_len) {
        offset += len;
    }
    data.get(offset..)?.starts_with(b"fLaC").then_some(offset)
}

/// Metadata block headers in file order.
///
/// `None` unless the data is a FLAC stream starting with STREAMINFO whose
/// block chain fits inside the data.
pub fn metadata_blocks(data: &[u8]) -> Option<Vec<BlockHeader>> {
    let mut offset = stream_start(data)? + 4;
    let mut blocks = Vec::new();

    loop {
        let header = data.get(offset..offset + 4)?;
        let block = BlockHeader {
            kind: header[0] & 0x7F,
            last: header[0] & 0x80 != 0,
            offset,
            len: u32::from_be_bytes([0, header[1], header[2], header[3]]) as usize,
        };
        if block.end() > data.len() {
            return None;
        }
        offset = block.end();
        blocks.push(block);
        if block.last {
            break;
        }
    }

    (blocks.first()?.kind == STREAMINFO).then_some(blocks)
}

/// Append a PADDING block of `size` bytes as the last metadata block.
///
/// Returns `None` when the chain already ends in padding or the data isn't
/// a well-formed FLAC stream.
pub fn with_trailing_padding(data: &[u8], size: u32) -> Option<Vec<u8>> {
    let blocks = metadata_blocks(data)?;
    let last = blocks.last()?;
    if last.kind == PADDING {
        return None;
    }

    let size = size.min(MAX_BLOCK_LEN);
    let end = last.end();

    let mut out = Vec::with_capacity(data.len() + 4 + size as usize);
    out.extend_from_slice(&data[..end]);
    out[last.offset] &= 0x7F;
    out.push(0x80 | PADDING);
    out.extend_from_slice(&size.to_be_bytes()[1..]);
    out.resize(out.len() + size as usize, 0);
    out.extend_from_slice(&data[end..]);
    Some(out)
}

/// Rewrite a FLAC file so its metadata ends in padding.
///
/// Returns whether the file changed. Anything that isn't a well-formed FLAC
/// stream is left alone for lofty to reject.
pub fn ensure_trailing_padding(path: &Path) -> Result<bool> {
    let data = std::fs::read(path).with_context(format!("Failed to read {}", path.display()))?;
    let Some(padded) = with_trailing_padding(&data, DEFAULT_PADDING) else {
        return Ok(false);
    };

    replace_file(path, &padded)?;
    tracing::debug!(path = %path.display(), "Appended padding block");
    Ok(true)
}

/// Replace a file's contents atomically (write to temp, then rename).
pub fn replace_file(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("flac.tmp");
    std::fs::write(&temp_path, data)
        .with_context(format!("Failed to write {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path).with_context(format!("Failed to replace {}", path.display()))
}
