//! Bounded-concurrency batch enrichment.
//!
//! Each file runs in its own task; at most `workers` run at once and the
//! rest queue. A free worker takes the next file as soon as any file
//! finishes. A file that fails, or whose task panics, is reported as failed
//! without touching the others.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;

use crate::enrichment::EnrichmentService;
use crate::model::{EnrichmentResult, EnrichmentStatus};

/// Counts per terminal status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub completed: usize,
    pub partial: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[EnrichmentResult]) -> Self {
        let mut summary = Self::default();
        for result in results {
            match result.status {
                EnrichmentStatus::Completed => summary.completed += 1,
                EnrichmentStatus::Partial => summary.partial += 1,
                EnrichmentStatus::Skipped => summary.skipped += 1,
                EnrichmentStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.completed + self.partial + self.skipped + self.failed
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files: {} completed, {} partial, {} skipped, {} failed",
            self.total(),
            self.completed,
            self.partial,
            self.skipped,
            self.failed
        )
    }
}

/// Results of one batch run, in enumeration order
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub results: Vec<EnrichmentResult>,
    pub summary: BatchSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drop repeated paths, keeping the first occurrence.
pub fn dedupe(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .filter(|p| seen.insert(p.clone()))
        .collect()
}

/// Enrich every path with at most `workers` files in flight.
///
/// Waits for every file to reach a terminal status.
pub async fn run_batch(
    service: Arc<EnrichmentService>,
    paths: Vec<PathBuf>,
    workers: usize,
) -> BatchReport {
    let started_at = Utc::now();
    let paths = dedupe(paths);
    let workers = workers.max(1);

    tracing::info!(files = paths.len(), workers, "Starting batch");

    let jobs = futures::stream::iter(paths.into_iter().enumerate());
    let mut results: Vec<(usize, EnrichmentResult)> = jobs
        .map(|(index, path)| {
            let service = Arc::clone(&service);
            async move {
                let task_path = path.clone();
                let handle =
                    tokio::spawn(async move { service.enrich_file(&task_path).await });
                let result = match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(path = %path.display(), error = %e, "Enrichment task died");
                        EnrichmentResult::failed(path, format!("task failed: {}", e))
                    }
                };
                (index, result)
            }
        })
        .buffer_unordered(workers)
        .inspect(|(_, result)| {
            tracing::info!(
                path = %result.path.display(),
                status = %result.status,
                reason = result.reason.as_deref().unwrap_or(""),
                "Enriched"
            );
        })
        .collect()
        .await;

    // Completion order back to enumeration order
    results.sort_by_key(|(index, _)| *index);
    let results: Vec<EnrichmentResult> = results.into_iter().map(|(_, result)| result).collect();

    let summary = BatchSummary::from_results(&results);
    tracing::info!("{}", summary);

    BatchReport {
        results,
        summary,
        started_at,
        finished_at: Utc::now(),
    }
}
