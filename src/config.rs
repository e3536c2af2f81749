//! Ingestion configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILCANON_CONFIG` (environment variable)
//! 2. `~/.config/mailcanon/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailcanon\config.toml` (Windows)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Raw message parsing limits and options.
    pub parser: ParserConfig,
    /// Default importance scoring.
    pub scoring: ScoringConfig,
    /// Logging for the diagnostic binary.
    pub logging: LoggingConfig,
}

/// Raw message parsing limits and options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum nesting depth of multipart / embedded message containers.
    pub max_part_depth: usize,
    /// Maximum raw message size in bytes (default: 268435456 = 256 MB).
    pub max_message_size: usize,
    /// Undo quoted-printable transfer encoding on text parts.
    pub decode_quoted_printable: bool,
}

/// Default importance scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Score given to non-spam messages, clamped to 50–100.
    pub placeholder_score: u8,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: String,
}

// ── Default implementations ─────────────────────────────────────

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_part_depth: crate::parser::mime::MAX_DEPTH,
            max_message_size: 256 * 1024 * 1024, // 256 MB
            decode_quoted_printable: true,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            placeholder_score: 75,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match load_config_from(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path.display(), "Loaded config");
                    return cfg;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to load config, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Load configuration from an explicit file.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| IngestError::io(path, e))?;
    toml::from_str::<Config>(&contents).map_err(|e| IngestError::Config {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Save configuration to `path`, creating parent directories.
pub fn save_config(config: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(())
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILCANON_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailcanon").join("config.toml"))
}
