//! flac-minder - fills in missing genres and cover art on FLAC files.
//!
//! Genres come from MusicBrainz tag votes and covers from the Cover Art
//! Archive. Existing tags are never overwritten by enrichment; only
//! absent fields and images are added.

pub mod batch;
pub mod cli;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod metadata;
pub mod model;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging (RUST_LOG overrides the default)
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flac_minder=info")))
        .init();

    cli::run_command(&args)
}
