//! taskbridge core library — ledger parsing, domain types, config, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes and domain structs
//! - [`ledger`] — permissive document parser / serializer
//! - [`config`] — `~/.taskbridge/config.yaml` registry
//! - [`error`] — [`LedgerError`], [`ConfigError`]

pub mod config;
pub mod error;
pub mod ledger;
pub mod types;

pub use error::{ConfigError, LedgerError};
pub use ledger::{Ledger, INSERTION_MARKER};
pub use types::{AgentName, Record, RecordId, TaskKind, TaskStatus};
