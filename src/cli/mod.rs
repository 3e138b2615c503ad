//! Command-line interface for flac-minder.
//!
//! This module provides CLI commands for enriching files, picking covers,
//! and inspecting or editing tags by hand.

mod commands;

pub use commands::{Cli, Commands, run_command};
