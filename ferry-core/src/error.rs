//! Error types for ferry-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from host inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load. Includes file path and line context from serde_yaml.
    #[error("failed to parse host inventory at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`, so we cannot locate `~/.ferry/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// No inventory entry carries the requested name.
    #[error("host '{name}' is not in the inventory")]
    HostNotFound { name: String },
}
