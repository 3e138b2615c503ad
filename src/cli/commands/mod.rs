//! CLI command definitions and dispatch.
//!
//! This module provides the command-line interface for flac-minder.
//! Each group of subcommands is implemented in its own submodule:
//! - `enrich`: Batch genre and cover completion
//! - `covers`: Cover candidate display and manual cover pick
//! - `tags`: Tag inspection and manual writes
//! - `settings`: Config file inspection

mod covers;
mod enrich;
mod settings;
mod tags;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

pub use covers::{cmd_covers, cmd_set_cover};
pub use enrich::cmd_enrich;
pub use settings::cmd_config;
pub use tags::{cmd_show, cmd_write_tags};

use crate::config::{self, Config};

/// flac-minder CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true, env = "FLAC_MINDER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Contact sent to MusicBrainz in the User-Agent (overrides config)
    #[arg(long, global = true, env = "FLAC_MINDER_CONTACT")]
    pub contact: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Fill in missing genres and covers
    Enrich {
        /// Path to file or directory to enrich
        path: PathBuf,
        /// Files processed concurrently
        #[arg(short, long)]
        workers: Option<usize>,
        /// Recursive directory scan
        #[arg(short, long)]
        recursive: bool,
        /// Dry run - run every lookup but don't write anything
        #[arg(long)]
        dry_run: bool,
        /// Drop unusable images when embedding a missing cover
        #[arg(long)]
        replace_covers: bool,
    },
    /// List cover candidates for a file from every search strategy
    Covers {
        /// Path to the audio file
        path: PathBuf,
        /// Search this text instead of the file's tags
        #[arg(short, long)]
        query: Option<String>,
        /// Save every candidate image into this directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Embed an image as the file's only front cover
    SetCover {
        /// Path to the audio file
        path: PathBuf,
        /// Image file (converted to JPEG)
        image: PathBuf,
    },
    /// Write tags to an audio file (overwrites)
    WriteTags {
        /// Path to the audio file
        path: PathBuf,
        #[arg(long)]
        genre: Option<String>,
        /// Release year (also written to DATE)
        #[arg(long)]
        year: Option<String>,
        /// Release date (YEAR is derived when not given)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        artist: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        album: Option<String>,
        /// Any other field, as KEY=VALUE (repeatable)
        #[arg(long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
    /// Show a file's tags and embedded images
    Show {
        /// Path to the audio file
        path: PathBuf,
    },
    /// Print the effective configuration
    Config {
        /// Write the defaults to the config file if none exists
        #[arg(long)]
        init: bool,
    },
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let mut config = load_config(cli.config.as_deref());
    if let Some(contact) = &cli.contact {
        config.catalog.contact = contact.clone();
    }

    match &cli.command {
        Commands::Enrich {
            path,
            workers,
            recursive,
            dry_run,
            replace_covers,
        } => {
            let rt = Runtime::new()?;
            cmd_enrich(
                &rt,
                &config,
                path,
                *workers,
                *recursive,
                *dry_run,
                *replace_covers,
            )
        }
        Commands::Covers { path, query, out } => {
            let rt = Runtime::new()?;
            cmd_covers(&rt, &config, path, query.as_deref(), out.as_deref())
        }
        Commands::SetCover { path, image } => cmd_set_cover(path, image),
        Commands::WriteTags {
            path,
            genre,
            year,
            date,
            artist,
            title,
            album,
            fields,
        } => {
            let mut updates = Vec::new();
            for (field, value) in [
                ("GENRE", genre),
                ("YEAR", year),
                ("DATE", date),
                ("ARTIST", artist),
                ("TITLE", title),
                ("ALBUM", album),
            ] {
                if let Some(value) = value {
                    updates.push((field.to_string(), value.clone()));
                }
            }
            for pair in fields {
                updates.push(parse_field(pair)?);
            }
            cmd_write_tags(path, &updates)
        }
        Commands::Show { path } => cmd_show(path),
        Commands::Config { init } => cmd_config(&config, cli.config.as_deref(), *init),
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(path) => config::load_from(path),
        None => config::load(),
    }
}

/// Parse `KEY=VALUE`
pub(crate) fn parse_field(pair: &str) -> anyhow::Result<(String, String)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Expected KEY=VALUE, got {:?}", pair))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Empty field name in {:?}", pair);
    }
    Ok((key.to_uppercase(), value.to_string()))
}

/// File name for display
pub(crate) fn display_name(path: &Path) -> &str {
    path.file_name().and_then(|s| s.to_str()).unwrap_or("?")
}
