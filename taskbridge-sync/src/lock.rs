//! Advisory per-record locking with timeout-based staleness reclaim.
//!
//! Locks live in the record's header block as two persisted fields:
//! `locked_by` (agent name, empty = unlocked) and `locked_at` (UTC
//! timestamp, empty = unlocked). Locking is file-based and advisory — all
//! mutating agents are cooperating members of the same pipeline, and the
//! target filesystem is not guaranteed to support robust native locks.

use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

use taskbridge_core::ledger::Ledger;
use taskbridge_core::types::AgentName;

use crate::atomic::{read_document, update_field, write_atomic, FieldValue};
use crate::error::SyncError;

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockOutcome {
    /// The lock was taken (or a stale lock reclaimed).
    Granted,
    /// Another agent holds a live lock. Retry on a later cycle.
    Denied { holder: AgentName },
}

/// Attempt to acquire the advisory lock on the record at `path`.
///
/// - Unset lock fields: stamp owner + timestamp, return `Granted`.
/// - Held for less than `timeout_minutes`: return `Denied`.
/// - Held for `timeout_minutes` or longer: stale — reclaim and return
///   `Granted`.
///
/// An unparsable `locked_at` timestamp is treated as no lock, not an error.
pub fn acquire(
    path: &Path,
    agent: &AgentName,
    timeout_minutes: i64,
) -> Result<LockOutcome, SyncError> {
    let content = read_document(path)?;
    let ledger = Ledger::parse(&content);

    if let Some(header) = &ledger.header {
        let locked_by = header.get("locked_by").unwrap_or("");
        let locked_at = header.get("locked_at").unwrap_or("");
        if !locked_by.is_empty() && !locked_at.is_empty() {
            if let Ok(taken_at) = DateTime::parse_from_rfc3339(locked_at) {
                let age = Utc::now().signed_duration_since(taken_at.with_timezone(&Utc));
                if age < Duration::minutes(timeout_minutes) {
                    return Ok(LockOutcome::Denied {
                        holder: AgentName::from(locked_by),
                    });
                }
                tracing::info!(
                    "reclaiming stale lock on {} (held by {locked_by} for {}m)",
                    path.display(),
                    age.num_minutes()
                );
            }
            // Unparsable timestamp: proceed to acquire.
        }
    }

    let stamped = stamp(&content, agent, &now_token()).map_err(|e| integrity(path, e))?;
    write_atomic(path, &stamped)?;
    Ok(LockOutcome::Granted)
}

/// Release the lock at `path` by clearing both fields.
///
/// Deliberately does NOT verify the caller owns the lock: an agent that died
/// mid-task must be recoverable by any of its peers without ceremony. The
/// cost is that a misbehaving caller can break another agent's live lock.
pub fn release(path: &Path) -> Result<(), SyncError> {
    let content = read_document(path)?;
    let cleared = clear_lock_fields_in(&content).map_err(|e| integrity(path, e))?;
    write_atomic(path, &cleared)
}

/// Mark the record at `path` failed: set `status: failed`, store the error
/// text, increment `retry_count`, and clear both lock fields — in one atomic
/// rewrite. A crash mid-operation leaves the record entirely unchanged.
pub fn mark_failed(path: &Path, error_text: &str) -> Result<(), SyncError> {
    let content = read_document(path)?;
    let ledger = Ledger::parse(&content);
    let retry_count = ledger
        .header
        .as_ref()
        .and_then(|h| h.get("retry_count"))
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0);

    let updated = update_field(&content, "status", &"failed".into())
        .and_then(|doc| update_field(&doc, "error", &error_text.into()))
        .and_then(|doc| update_field(&doc, "retry_count", &(retry_count + 1).into()))
        .and_then(|doc| clear_lock_fields_in(&doc))
        .map_err(|e| integrity(path, e))?;

    write_atomic(path, &updated)
}

fn stamp(
    content: &str,
    agent: &AgentName,
    timestamp: &str,
) -> Result<String, taskbridge_core::LedgerError> {
    update_field(content, "locked_by", &agent.0.as_str().into())
        .and_then(|doc| update_field(&doc, "locked_at", &timestamp.into()))
}

fn clear_lock_fields_in(content: &str) -> Result<String, taskbridge_core::LedgerError> {
    update_field(content, "locked_by", &FieldValue::from(""))
        .and_then(|doc| update_field(&doc, "locked_at", &FieldValue::from("")))
}

fn integrity(path: &Path, source: taskbridge_core::LedgerError) -> SyncError {
    SyncError::Integrity {
        path: path.to_path_buf(),
        source,
    }
}

/// Current UTC time as an RFC 3339 token with a `Z` suffix, the persisted
/// `locked_at` format.
pub fn now_token() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
