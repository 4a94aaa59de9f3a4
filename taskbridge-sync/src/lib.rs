//! # taskbridge-sync
//!
//! The synchronization and locking engine: atomic document mutation,
//! advisory per-record locking with staleness reclaim, stable identity
//! resolution, and bidirectional reconciliation against a remote mirror
//! store.
//!
//! Build a [`Reconciler`] over any [`RemoteStore`] implementation and call
//! [`Reconciler::run`] for one `Pull → Merge → Push` cycle.

pub mod atomic;
pub mod diff;
pub mod error;
pub mod identity;
pub mod lock;
pub mod reconcile;
pub mod remote;

pub use atomic::{update_field, update_field_atomic, write_atomic, FieldValue};
pub use error::{RemoteError, SyncError};
pub use lock::{acquire, mark_failed, release, LockOutcome};
pub use reconcile::{quick_add, CyclePhase, CycleReport, CycleStats, Reconciler, SyncMode};
pub use remote::{fetch_all, MemoryStore, Page, Projection, RemoteRecord, RemoteRef, RemoteStore};
