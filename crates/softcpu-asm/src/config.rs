//! JSON loading for [`CpuConfig`].
//!
//! Missing fields take their defaults, so `{"bits": 8}` is a complete file.

use std::path::{Path, PathBuf};

use softcpu_core::{ConfigError, CpuConfig};
use thiserror::Error;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// File could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// File is not valid configuration JSON.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Parsed values were rejected by validation.
    #[error(transparent)]
    Invalid(#[from] ConfigError),
}

/// Parses and validates a configuration from JSON text.
///
/// # Errors
///
/// Returns [`LoadConfigError::Json`] for malformed input and
/// [`LoadConfigError::Invalid`] for out-of-range values.
pub fn parse_config(json: &str) -> Result<CpuConfig, LoadConfigError> {
    let config: CpuConfig = serde_json::from_str(json)?;
    config.validate()?;
    Ok(config)
}

/// Loads and validates a configuration file.
///
/// # Errors
///
/// Returns [`LoadConfigError`] if the file cannot be read, parsed or validated.
pub fn load_config(path: &Path) -> Result<CpuConfig, LoadConfigError> {
    let json = std::fs::read_to_string(path).map_err(|source| LoadConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&json)
}
