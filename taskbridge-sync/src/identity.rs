//! Stable identity resolution for ledger records.
//!
//! Continuity beats generation: a record whose content references an
//! externally defined ticket file keeps that ticket's identifier verbatim.
//! Everything else draws from a numeric `TASK-nnn` sequence seeded from the
//! highest identifier already present in the mirror.
//!
//! Matching against the mirror falls back to an 8-hex content fingerprint
//! for records created before identifiers existed. Two records with
//! identical status + content collide on that fingerprint and the first one
//! wins — a known, accepted heuristic limitation.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use taskbridge_core::types::{Record, RecordId, TaskStatus};

use crate::remote::{RemoteRecord, RemoteRef};

static TICKET_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"ticket:\s*data/tickets/(TKT-\d+)\.md").expect("ticket id regex is valid")
});
static TASK_SEQ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^TASK-(\d+)$").expect("task sequence regex is valid"));

/// 8-hex similarity key over `status:content`.
pub fn fingerprint(status: &TaskStatus, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{status}:{content}").as_bytes());
    hex::encode(hasher.finalize())[..8].to_owned()
}

/// Ticket identifier referenced by the record's content, if any.
pub fn ticket_id(content: &str) -> Option<RecordId> {
    TICKET_ID_RE
        .captures(content)
        .map(|caps| RecordId::from(&caps[1]))
}

// ---------------------------------------------------------------------------
// Allocator
// ---------------------------------------------------------------------------

/// Sequence allocator for `TASK-nnn` identifiers.
///
/// Seeded once per session from the maximum sequence number observed among
/// already-synced remote records, so fresh identifiers never collide with
/// the mirror.
#[derive(Debug, Default)]
pub struct IdAllocator {
    counter: u32,
}

impl IdAllocator {
    /// Seed from the remote listing.
    pub fn seeded_from(records: &[RemoteRecord]) -> IdAllocator {
        let counter = records
            .iter()
            .filter_map(|r| TASK_SEQ_RE.captures(&r.projection.task_id.0))
            .filter_map(|caps| caps[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        IdAllocator { counter }
    }

    /// Identity for a record: reuse a referenced ticket identifier verbatim,
    /// otherwise allocate the next unused sequence number.
    pub fn generate(&mut self, record: &Record) -> RecordId {
        if let Some(id) = ticket_id(&record.content) {
            return id;
        }
        self.next_id()
    }

    /// Allocate the next `TASK-nnn` identifier unconditionally.
    pub fn next_id(&mut self) -> RecordId {
        self.counter += 1;
        RecordId(format!("TASK-{:03}", self.counter))
    }
}

// ---------------------------------------------------------------------------
// Remote index
// ---------------------------------------------------------------------------

/// Remote records indexed for identity matching: by identifier, and by the
/// fingerprint of their projected status + content.
#[derive(Debug, Default)]
pub struct RemoteIndex {
    by_id: HashMap<RecordId, RemoteRef>,
    by_fingerprint: HashMap<String, RecordId>,
}

impl RemoteIndex {
    pub fn build(records: &[RemoteRecord]) -> RemoteIndex {
        let mut index = RemoteIndex::default();
        for record in records {
            let id = record.projection.task_id.clone();
            if id.0.is_empty() {
                continue;
            }
            index
                .by_fingerprint
                .entry(fingerprint(
                    &record.projection.status,
                    &record.projection.content,
                ))
                .or_insert_with(|| id.clone());
            index.by_id.insert(id, record.reference.clone());
        }
        index
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn reference(&self, id: &RecordId) -> Option<&RemoteRef> {
        self.by_id.get(id)
    }

    /// Match a local record to an existing remote identity.
    ///
    /// Precedence: exact identifier match (referenced ticket id, or the
    /// record's fingerprint appearing literally as a remote id — legacy hash
    /// identifiers), then fingerprint similarity.
    pub fn match_existing(&self, record: &Record) -> Option<RecordId> {
        if let Some(id) = ticket_id(&record.content) {
            if self.contains(&id) {
                return Some(id);
            }
        }
        let fp = fingerprint(&record.status, &record.content);
        let as_id = RecordId(fp.clone());
        if self.contains(&as_id) {
            return Some(as_id);
        }
        self.by_fingerprint.get(&fp).cloned()
    }
}

/// Merge-direction matching: find the local record a remote record refers
/// to. Ticket identifiers match exactly; everything else matches by content
/// containment in either direction, which stays stable across a
/// remote-side status change.
pub fn match_remote_to_local(remote: &RemoteRecord, locals: &[Record]) -> Option<usize> {
    let remote_id = &remote.projection.task_id;
    if !remote_id.0.is_empty() {
        if let Some(idx) = locals
            .iter()
            .position(|r| ticket_id(&r.content).as_ref() == Some(remote_id))
        {
            return Some(idx);
        }
    }

    let remote_content = remote.projection.content.as_str();
    if remote_content.is_empty() {
        return None;
    }
    locals.iter().position(|r| {
        !r.content.is_empty()
            && (remote_content.contains(&r.content) || r.content.contains(remote_content))
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
