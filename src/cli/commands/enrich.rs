//! Batch enrichment command.

use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::batch::{self, BatchReport};
use crate::config::{Config, CoverPolicy};
use crate::enrichment::{EnrichmentConfig, EnrichmentService};
use crate::model::{EnrichmentResult, EnrichmentStatus, fields};
use crate::scanner::{self, ScanOptions};

use super::display_name;

/// Fill in missing genres and covers for a file or directory
pub fn cmd_enrich(
    rt: &Runtime,
    config: &Config,
    path: &Path,
    workers: Option<usize>,
    recursive: bool,
    dry_run: bool,
    replace_covers: bool,
) -> anyhow::Result<()> {
    let options = ScanOptions {
        extensions: config.batch.extensions.clone(),
        recursive: recursive || config.batch.recursive,
    };
    let files = scanner::collect_files(path, &options)?;

    if files.is_empty() {
        println!("No audio files found.");
        return Ok(());
    }

    let mut enrichment = EnrichmentConfig::from_config(config);
    enrichment.dry_run = dry_run;
    if replace_covers {
        enrichment.cover_policy = CoverPolicy::ReplaceExisting;
    }
    let workers = workers.unwrap_or(config.batch.workers);

    if config.catalog.contact.trim().is_empty() {
        tracing::warn!("No contact set; MusicBrainz asks clients to identify themselves (--contact)");
    }

    if dry_run {
        println!("DRY RUN - no changes will be made\n");
    }
    println!("Enriching {} file(s) with {} worker(s)...\n", files.len(), workers);

    let service = Arc::new(EnrichmentService::from_config(config, enrichment)?);
    let report = rt.block_on(batch::run_batch(service, files, workers));

    print_report(&report, dry_run);

    Ok(())
}

fn status_mark(status: EnrichmentStatus) -> &'static str {
    match status {
        EnrichmentStatus::Completed => "✓",
        EnrichmentStatus::Partial => "~",
        EnrichmentStatus::Skipped => "-",
        EnrichmentStatus::Failed => "✗",
    }
}

/// One line per file, e.g. `✓ song.flac: genre Rock, cover (by album)`
pub(crate) fn describe(result: &EnrichmentResult) -> String {
    let mut parts = Vec::new();
    let completed: Vec<&str> = result
        .added_fields
        .iter()
        .map(String::as_str)
        .filter(|field| *field != fields::GENRE)
        .collect();
    if !completed.is_empty() {
        parts.push(format!("added {}", completed.join("/")));
    }
    if let Some(ref genre) = result.genre {
        parts.push(format!("genre {}", genre));
    }
    if result.cover_embedded {
        match result.cover_strategy {
            Some(strategy) => parts.push(format!("cover ({})", strategy)),
            None => parts.push("cover".to_string()),
        }
    }
    if result.legacy_removed {
        parts.push("legacy ID3 removed".to_string());
    }
    if let Some(ref reason) = result.reason {
        parts.push(reason.clone());
    }

    format!(
        "{} {}: {}",
        status_mark(result.status),
        display_name(&result.path),
        if parts.is_empty() {
            result.status.to_string()
        } else {
            parts.join(", ")
        }
    )
}

fn print_report(report: &BatchReport, dry_run: bool) {
    for result in &report.results {
        println!("{}", describe(result));
    }

    let elapsed = report.finished_at - report.started_at;
    println!();
    println!(
        "Done in {:.1}s! {}",
        elapsed.num_milliseconds() as f64 / 1000.0,
        report.summary
    );

    if dry_run && report.results.iter().any(EnrichmentResult::changed) {
        println!("\nRun without --dry-run to write tags.");
    }
}
