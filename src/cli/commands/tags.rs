//! Tag inspection and manual tag writes.

use std::path::Path;

use crate::metadata::{self, LoftyTagStore, TagStore};
use crate::model::{ImageRole, MediaItem};

use super::display_name;

/// Print a file's tags and embedded images
pub fn cmd_show(path: &Path) -> anyhow::Result<()> {
    let item = LoftyTagStore::new().load(path)?;
    print!("{}", render(&item));
    Ok(())
}

/// Overwrite fields on a file
pub fn cmd_write_tags(path: &Path, updates: &[(String, String)]) -> anyhow::Result<()> {
    if updates.is_empty() {
        println!("Nothing to write.");
        return Ok(());
    }

    let item = metadata::write_fields(&LoftyTagStore::new(), path, updates)?;

    println!("✓ Updated {}", display_name(path));
    for (field, _) in updates {
        let field = field.to_uppercase();
        if let Some(value) = item.tags.value(&field) {
            println!("  {} = {}", field, value);
        }
    }
    Ok(())
}

fn render(item: &MediaItem) -> String {
    let mut out = format!("{}\n", item.path.display());
    out.push_str(&format!(
        "  Duration: {}:{:02}\n",
        item.duration_secs / 60,
        item.duration_secs % 60
    ));
    if item.has_legacy_tags {
        out.push_str("  Legacy ID3 tags present\n");
    }

    if item.tags.is_empty() {
        out.push_str("  (no tags)\n");
    }
    for (field, value) in item.tags.iter() {
        out.push_str(&format!("  {:<12} {}\n", field, value));
    }

    for (i, image) in item.images.iter().enumerate() {
        out.push_str(&format!(
            "  Image {}: {} {} bytes{}\n",
            i + 1,
            image.mime_type,
            image.data.len(),
            if image.role == ImageRole::FrontCover {
                " (front cover)"
            } else {
                ""
            }
        ));
    }
    out
}
