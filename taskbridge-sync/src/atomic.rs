//! Atomic mutation primitives.
//!
//! ## `write_atomic` — durability protocol
//!
//! 1. Create a temp file in the **same directory** as the target.
//! 2. Write the full content.
//! 3. Flush and fsync.
//! 4. Atomically rename over the target.
//!
//! A concurrent reader never observes a partially-written file; on any
//! failure before the rename the temp file is removed and the target is left
//! byte-identical to its pre-write state.

use std::fmt;
use std::io::Write as _;
use std::path::Path;

use tempfile::NamedTempFile;

use taskbridge_core::error::LedgerError;
use taskbridge_core::ledger::locate_header;

use crate::error::{io_err, SyncError};

// ---------------------------------------------------------------------------
// write_atomic
// ---------------------------------------------------------------------------

/// Atomically replace the file at `path` with `content`.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), SyncError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| io_err(parent, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| io_err(path, e))?;
    tmp.flush().map_err(|e| io_err(path, e))?;
    tmp.as_file().sync_all().map_err(|e| io_err(path, e))?;

    // Dropping the PersistError removes the temp file.
    tmp.persist(path).map_err(|e| io_err(path, e.error))?;

    tracing::debug!("wrote: {}", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Field values
// ---------------------------------------------------------------------------

/// A value destined for a `key: value` header line.
///
/// Encoding rules: empty string → `""`; a string containing whitespace, a
/// colon, or a reserved literal (`true`/`false`/`null`) → quoted; integers
/// and booleans → bare literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl FieldValue {
    fn encode(&self) -> String {
        match self {
            FieldValue::Str(s) if s.is_empty() => "\"\"".to_owned(),
            FieldValue::Str(s) if needs_quoting(s) => format!("\"{s}\""),
            FieldValue::Str(s) => s.clone(),
            FieldValue::Int(i) => i.to_string(),
            FieldValue::Bool(b) => b.to_string(),
        }
    }
}

fn needs_quoting(s: &str) -> bool {
    s.chars().any(char::is_whitespace)
        || s.contains(':')
        || matches!(s, "true" | "false" | "null")
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Str(s.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Str(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<u32> for FieldValue {
    fn from(i: u32) -> Self {
        FieldValue::Int(i64::from(i))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

// ---------------------------------------------------------------------------
// update_field
// ---------------------------------------------------------------------------

/// Update a single `field: value` line inside the header block.
///
/// Edits in place preserving indentation; inserts immediately before the
/// closing delimiter when the field is absent. Applying the same
/// `(field, value)` twice yields byte-identical output — required for safe
/// retries.
pub fn update_field(
    document: &str,
    field: &str,
    value: &FieldValue,
) -> Result<String, LedgerError> {
    let mut lines: Vec<String> = document.split('\n').map(str::to_owned).collect();
    let (open_idx, close_idx) = locate_header(&lines)?;

    let prefix = format!("{field}:");
    let encoded = value.encode();
    let mut found = false;
    for line in &mut lines[open_idx + 1..close_idx] {
        if line.trim_start().starts_with(&prefix) {
            let indent = line.len() - line.trim_start().len();
            *line = format!("{}{field}: {encoded}", " ".repeat(indent));
            found = true;
            break;
        }
    }
    if !found {
        lines.insert(close_idx, format!("{field}: {encoded}"));
    }

    Ok(lines.join("\n"))
}

/// Read `path`, update a single header field, and write back atomically.
///
/// A document without the expected header structure fails with
/// [`SyncError::Integrity`] and produces no partial write.
pub fn update_field_atomic(path: &Path, field: &str, value: &FieldValue) -> Result<(), SyncError> {
    let content = read_document(path)?;
    let updated = update_field(&content, field, value).map_err(|e| match e {
        LedgerError::MissingHeader | LedgerError::UnclosedHeader => SyncError::Integrity {
            path: path.to_path_buf(),
            source: e,
        },
        other => SyncError::Ledger(other),
    })?;
    write_atomic(path, &updated)
}

pub(crate) fn read_document(path: &Path) -> Result<String, SyncError> {
    if !path.exists() {
        return Err(SyncError::Ledger(LedgerError::NotFound {
            path: path.to_path_buf(),
        }));
    }
    std::fs::read_to_string(path).map_err(|e| io_err(path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
