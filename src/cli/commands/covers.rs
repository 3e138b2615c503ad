//! Cover candidate display and manual cover pick.

use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::enrichment::{CoverCandidate, EnrichmentConfig, EnrichmentService};
use crate::metadata::{self, LoftyTagStore};

use super::display_name;

/// List every cover candidate for a file, optionally saving the images
pub fn cmd_covers(
    rt: &Runtime,
    config: &Config,
    path: &Path,
    query: Option<&str>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let service = Arc::new(EnrichmentService::from_config(
        config,
        EnrichmentConfig::from_config(config),
    )?);

    if let Some(dir) = out {
        std::fs::create_dir_all(dir)?;
    }

    rt.block_on(async {
        let mut rx = match query {
            Some(text) => {
                println!("Searching covers for {:?}...\n", text);
                service.search_covers(text)
            }
            None => {
                let item = service.load(path).await?;
                println!("Searching covers for {}...\n", display_name(path));
                service.collect_covers(&item)
            }
        };

        let mut count = 0;
        while let Some(candidate) = rx.recv().await {
            count += 1;
            println!("{:>3}. {}", count, describe(&candidate));

            if let Some(dir) = out {
                let file = dir.join(candidate_file_name(count, &candidate));
                std::fs::write(&file, &candidate.asset.data)?;
                println!("     saved {}", file.display());
            }
        }

        if count == 0 {
            println!("No covers found.");
        }
        anyhow::Ok(())
    })
}

/// Embed an image file as the only front cover
pub fn cmd_set_cover(path: &Path, image: &Path) -> anyhow::Result<()> {
    let data = std::fs::read(image)?;
    let asset = metadata::set_cover(&LoftyTagStore::new(), path, data)?;

    println!("✓ Cover set on {}", display_name(path));
    println!(
        "  {}x{} {} (from {})",
        asset.width, asset.height, asset.mime_type, asset.source_mime_type
    );
    Ok(())
}

fn describe(candidate: &CoverCandidate) -> String {
    let release = &candidate.release;
    let who = release.artist.as_deref().unwrap_or("?");
    format!(
        "[{}] {} - {} ({}x{}) {}",
        candidate.strategy,
        who,
        release.title,
        candidate.asset.width,
        candidate.asset.height,
        release.id
    )
}

fn candidate_file_name(n: usize, candidate: &CoverCandidate) -> String {
    let bucket = candidate.strategy.label().replace(' ', "-");
    format!("{:02}-{}-{}.jpg", n, bucket, candidate.release.id)
}
