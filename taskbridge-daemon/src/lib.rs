//! # taskbridge-daemon
//!
//! Watch-mode runtime: an explicit fixed-interval [`Scheduler`] with a
//! cancellation signal, running strictly serialized sync cycles.

pub mod error;
pub mod runtime;

pub use error::DaemonError;
pub use runtime::{start_blocking, Scheduler, ShutdownHandle};
