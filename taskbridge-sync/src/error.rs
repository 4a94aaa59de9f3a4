//! Error types for taskbridge-sync.

use std::path::PathBuf;

use thiserror::Error;

use taskbridge_core::error::{ConfigError, LedgerError};

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from ledger parsing or loading.
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// An error from the config registry.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A structured update was attempted on a document lacking the expected
    /// header block. The document is left untouched.
    #[error("integrity error at {path}: {source}")]
    Integrity {
        path: PathBuf,
        #[source]
        source: LedgerError,
    },

    /// The remote store rejected or failed a call.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

/// Errors surfaced by a remote store client.
///
/// The reconciler only tallies these per record — a remote failure never
/// aborts a cycle — so the variants stay coarse and transport-agnostic.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network-level failure (DNS, connect, timeout).
    #[error("remote transport error: {0}")]
    Transport(String),

    /// The API answered with a non-success status.
    #[error("remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The API answered with a body the client could not make sense of.
    #[error("remote response decode error: {0}")]
    Decode(String),

    /// The store is not usable as configured (missing token, no data source).
    #[error("remote store misconfigured: {0}")]
    Misconfigured(String),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
