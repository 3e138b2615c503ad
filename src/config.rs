//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\flac-minder\config.toml
//! - macOS: ~/Library/Application Support/flac-minder/config.toml
//! - Linux: ~/.config/flac-minder/config.toml
//!
//! The config file is human-readable and editable. Every section is
//! optional; command-line flags override what is loaded here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::enrichment::coverart::CoverSize;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote catalog (MusicBrainz) settings
    pub catalog: CatalogConfig,

    /// Cover art download and embedding
    pub cover: CoverConfig,

    /// Batch scheduling
    pub batch: BatchConfig,

    /// Legacy (ID3 in FLAC) tag removal
    pub legacy: LegacyConfig,
}

/// Remote catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Application name sent in the User-Agent
    pub app_name: String,

    /// Application version sent in the User-Agent
    pub app_version: String,

    /// Contact (email or URL) sent in the User-Agent. MusicBrainz asks for one.
    pub contact: String,

    /// Web service root
    pub base_url: String,

    /// Result limit for release searches
    pub search_limit: u32,

    /// Result limit for recording searches (genre step 1)
    pub recording_limit: u32,

    /// Result limit for artist searches (genre step 2)
    pub artist_limit: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            app_name: "flac-minder".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            contact: String::new(),
            base_url: "https://musicbrainz.org/ws/2".to_string(),
            search_limit: 10,
            recording_limit: 5,
            artist_limit: 1,
            timeout_secs: 10,
        }
    }
}

impl CatalogConfig {
    /// Client identification string, e.g. `flac-minder/0.1.0 ( me@example.org )`
    pub fn user_agent(&self) -> String {
        let contact = self.contact.trim();
        if contact.is_empty() {
            format!("{}/{}", self.app_name, self.app_version)
        } else {
            format!("{}/{} ( {} )", self.app_name, self.app_version, contact)
        }
    }
}

/// What to do with images already embedded in a file once a cover is found.
///
/// Either way a cover is only looked up when no `image/*` picture exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoverPolicy {
    /// Add the new cover in front of whatever images are there
    #[default]
    AddIfAbsent,
    /// Drop every existing image before adding the new cover
    ReplaceExisting,
}

/// Cover art settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    /// Cover Art Archive root
    pub base_url: String,

    /// Thumbnail size to download
    pub size: CoverSize,

    /// Existing image handling
    pub policy: CoverPolicy,

    /// Per-download timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            base_url: "https://coverartarchive.org".to_string(),
            size: CoverSize::Medium,
            policy: CoverPolicy::AddIfAbsent,
            timeout_secs: 10,
        }
    }
}

/// Batch scheduling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Files enriched concurrently
    pub workers: usize,

    /// File extensions to pick up (case-insensitive, no dot)
    pub extensions: Vec<String>,

    /// Descend into subdirectories
    pub recursive: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            extensions: vec!["flac".to_string()],
            recursive: false,
        }
    }
}

/// How legacy ID3 blocks are stripped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoverKind {
    /// Run an external program (metaflac by default)
    #[default]
    Command,
    /// Strip in-process, carrying missing fields over to Vorbis comments
    Builtin,
}

/// Legacy tag removal settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    pub remover: RemoverKind,

    /// Program for [`RemoverKind::Command`]
    pub program: String,

    /// Arguments placed before the file path
    pub args: Vec<String>,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            remover: RemoverKind::Command,
            program: "metaflac".to_string(),
            args: vec!["--remove".to_string(), "--block-type=ID3".to_string()],
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("flac-minder"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from disk
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };

    load_from(&path)
}

/// Load configuration from a specific file, falling back to defaults
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::debug!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

/// Save configuration to disk
///
/// Creates the config directory if it doesn't exist.
pub fn save(config: &Config) -> Result<PathBuf, ConfigError> {
    let dir = config_dir().ok_or(ConfigError::NoConfigDir)?;
    save_to(config, &dir.join("config.toml"))
}

/// Save configuration to a specific file
pub fn save_to(config: &Config, path: &Path) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ConfigError::CreateDir(dir.to_path_buf(), e))?;
    }

    let contents = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;

    // Write atomically (write to temp, then rename)
    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &contents).map_err(|e| ConfigError::Write(temp_path.clone(), e))?;
    std::fs::rename(&temp_path, path)
        .map_err(|e| ConfigError::Rename(temp_path, path.to_path_buf(), e))?;

    tracing::info!("Saved config to {:?}", path);
    Ok(path.to_path_buf())
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to create config directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),

    #[error("Failed to write config to {0}: {1}")]
    Write(PathBuf, std::io::Error),

    #[error("Failed to rename temp file {0} to {1}: {2}")]
    Rename(PathBuf, PathBuf, std::io::Error),
}

// ============================================================================
// Tests
// ============================================================================
