//! Error types for taskbridge-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from ledger parsing and loading.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger file did not exist at the expected path.
    #[error("ledger file not found: {path}")]
    NotFound { path: PathBuf },

    /// Underlying I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A mutating operation required a header block the document lacks.
    #[error("document has no header block")]
    MissingHeader,

    /// The header block opened but never closed — structurally malformed.
    #[error("unclosed header block")]
    UnclosedHeader,
}

/// All errors that can arise from config registry operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error (write/save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load — includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.taskbridge/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config YAML file did not exist at the expected path.
    #[error("config not found at {path}; run `taskbridge init` first")]
    ConfigNotFound { path: PathBuf },
}
