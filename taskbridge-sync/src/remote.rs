//! Remote mirror store contract.
//!
//! The reconciler depends only on this capability trait; the HTTP-backed
//! client lives in its own crate, and [`MemoryStore`] is a deterministic
//! in-memory fake for driving reconciliation tests without network access.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use taskbridge_core::types::{RecordId, TaskStatus};

use crate::error::RemoteError;

/// Opaque reference to a remote record (a page id, in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RemoteRef(pub String);

impl fmt::Display for RemoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The full named-property projection of a record, as pushed to the mirror.
///
/// Local is authoritative for every field here except `status`, which the
/// mirror owns during merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Projection {
    pub task_id: RecordId,
    pub status: TaskStatus,
    pub content: String,
    /// Routing label (`github_commit`, `free_form`, …).
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl Projection {
    /// A minimal projection — id, status, content, kind — with the optional
    /// fields unset.
    pub fn new(task_id: RecordId, status: TaskStatus, content: &str, kind: &str) -> Projection {
        Projection {
            task_id,
            status,
            content: content.to_owned(),
            kind: kind.to_owned(),
            draft_path: None,
            draft_content: None,
            published_url: None,
            error: None,
            repo: None,
            commit: None,
        }
    }
}

/// A remote record: reference plus projected properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub reference: RemoteRef,
    pub projection: Projection,
}

/// One page of a remote listing.
#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<RemoteRecord>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Capability interface to the remote mirror store.
pub trait RemoteStore {
    /// Fetch one page of records, resuming from `cursor`.
    fn list(&mut self, cursor: Option<String>) -> Result<Page, RemoteError>;

    /// Create a new remote record from a projection.
    fn create(&mut self, projection: &Projection) -> Result<RemoteRef, RemoteError>;

    /// Overwrite an existing remote record's properties.
    fn update(&mut self, reference: &RemoteRef, projection: &Projection)
        -> Result<(), RemoteError>;
}

/// Drain pagination cursors until the listing is exhausted.
pub fn fetch_all(store: &mut dyn RemoteStore) -> Result<Vec<RemoteRecord>, RemoteError> {
    let mut records = Vec::new();
    let mut cursor = None;
    loop {
        let page = store.list(cursor)?;
        records.extend(page.records);
        if !page.has_more {
            return Ok(records);
        }
        cursor = page.next_cursor;
    }
}

// ---------------------------------------------------------------------------
// In-memory fake
// ---------------------------------------------------------------------------

/// Deterministic in-memory store for reconciliation tests.
///
/// Tracks create/update call counts so idempotence properties can be
/// asserted directly, and can be told to fail calls for specific task ids to
/// exercise per-record error handling.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Vec<RemoteRecord>,
    next_ref: usize,
    /// Listing page size; 0 means everything in one page.
    pub page_size: usize,
    pub creates: usize,
    pub updates: usize,
    pub list_calls: usize,
    /// Task ids whose create/update calls fail with a synthetic API error.
    pub fail_task_ids: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Seed the store with a record, bypassing the create counter.
    pub fn seed(&mut self, projection: Projection) -> RemoteRef {
        let reference = self.alloc_ref();
        self.records.push(RemoteRecord {
            reference: reference.clone(),
            projection,
        });
        reference
    }

    pub fn records(&self) -> &[RemoteRecord] {
        &self.records
    }

    pub fn find(&self, task_id: &str) -> Option<&RemoteRecord> {
        self.records
            .iter()
            .find(|r| r.projection.task_id.0 == task_id)
    }

    fn alloc_ref(&mut self) -> RemoteRef {
        self.next_ref += 1;
        RemoteRef(format!("page-{:04}", self.next_ref))
    }

    fn check_failure(&self, projection: &Projection) -> Result<(), RemoteError> {
        if self.fail_task_ids.contains(&projection.task_id.0) {
            return Err(RemoteError::Api {
                status: 500,
                message: format!("synthetic failure for {}", projection.task_id),
            });
        }
        Ok(())
    }
}

impl RemoteStore for MemoryStore {
    fn list(&mut self, cursor: Option<String>) -> Result<Page, RemoteError> {
        self.list_calls += 1;
        let start: usize = cursor
            .as_deref()
            .map(str::parse)
            .transpose()
            .map_err(|_| RemoteError::Api {
                status: 400,
                message: "bad cursor".to_owned(),
            })?
            .unwrap_or(0);

        let size = if self.page_size == 0 {
            self.records.len().max(1)
        } else {
            self.page_size
        };
        let end = (start + size).min(self.records.len());
        let has_more = end < self.records.len();

        Ok(Page {
            records: self.records[start..end].to_vec(),
            next_cursor: has_more.then(|| end.to_string()),
            has_more,
        })
    }

    fn create(&mut self, projection: &Projection) -> Result<RemoteRef, RemoteError> {
        self.check_failure(projection)?;
        self.creates += 1;
        let reference = self.alloc_ref();
        self.records.push(RemoteRecord {
            reference: reference.clone(),
            projection: projection.clone(),
        });
        Ok(reference)
    }

    fn update(
        &mut self,
        reference: &RemoteRef,
        projection: &Projection,
    ) -> Result<(), RemoteError> {
        self.check_failure(projection)?;
        let record = self
            .records
            .iter_mut()
            .find(|r| &r.reference == reference)
            .ok_or_else(|| RemoteError::Api {
                status: 404,
                message: format!("no such page: {reference}"),
            })?;
        record.projection = projection.clone();
        self.updates += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
