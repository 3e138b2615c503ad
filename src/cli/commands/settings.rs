//! Config inspection.

use std::path::Path;

use crate::config::{self, Config};

/// Print the effective configuration, optionally writing it out first
pub fn cmd_config(config: &Config, path: Option<&Path>, init: bool) -> anyhow::Result<()> {
    let target = match path {
        Some(path) => Some(path.to_path_buf()),
        None => config::config_path(),
    };

    if init {
        match &target {
            Some(target) if target.exists() => {
                println!("Config already exists at {}", target.display());
            }
            Some(target) => {
                let written = config::save_to(config, target)?;
                println!("✓ Wrote {}", written.display());
            }
            None => {
                let written = config::save(config)?;
                println!("✓ Wrote {}", written.display());
            }
        }
    }

    match &target {
        Some(target) => println!("# {}", target.display()),
        None => println!("# (no config directory)"),
    }
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
