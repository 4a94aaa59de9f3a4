//! Domain types for the taskbridge ledger.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Statuses and kinds round-trip through the exact tokens the ledger grammar
//! uses (`TODO`, `WAITING_APPROVAL`, `github_commit`, …).

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed stable record identifier (`TKT-001`, `TASK-042`, or a
/// legacy 8-hex content fingerprint).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed name for a cooperating pipeline agent (`writer`,
/// `publisher`, `bridge`, …). Used as the lock owner token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentName(pub String);

impl fmt::Display for AgentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for AgentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AgentName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Status of a ledger record.
///
/// The known set matches the pipeline stages; anything else parses into
/// [`TaskStatus::Unknown`] so a noisy ledger never blocks processing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum TaskStatus {
    Todo,
    Processing,
    WaitingApproval,
    Approved,
    Publishing,
    Done,
    Failed,
    Unknown(String),
}

impl TaskStatus {
    /// All known statuses in pipeline order. Display grouping follows this.
    pub const KNOWN: [TaskStatus; 7] = [
        TaskStatus::Todo,
        TaskStatus::Processing,
        TaskStatus::WaitingApproval,
        TaskStatus::Approved,
        TaskStatus::Publishing,
        TaskStatus::Done,
        TaskStatus::Failed,
    ];

    /// Canonical upper-snake token as it appears in the ledger grammar.
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::Processing => "PROCESSING",
            TaskStatus::WaitingApproval => "WAITING_APPROVAL",
            TaskStatus::Approved => "APPROVED",
            TaskStatus::Publishing => "PUBLISHING",
            TaskStatus::Done => "DONE",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Unknown(s) => s,
        }
    }

    /// Parse a status token, case-insensitively. Unrecognized tokens are
    /// preserved verbatim in [`TaskStatus::Unknown`].
    pub fn parse(token: &str) -> TaskStatus {
        match token.to_ascii_uppercase().as_str() {
            "TODO" => TaskStatus::Todo,
            "PROCESSING" => TaskStatus::Processing,
            "WAITING_APPROVAL" => TaskStatus::WaitingApproval,
            "APPROVED" => TaskStatus::Approved,
            "PUBLISHING" => TaskStatus::Publishing,
            "DONE" => TaskStatus::Done,
            "FAILED" => TaskStatus::Failed,
            _ => TaskStatus::Unknown(token.to_owned()),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for TaskStatus {
    fn from(s: String) -> Self {
        TaskStatus::parse(&s)
    }
}

impl From<TaskStatus> for String {
    fn from(s: TaskStatus) -> Self {
        s.as_str().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// Classified kind of a record, one variant per routing target.
///
/// Classification precedence is load-bearing and lives in
/// [`crate::ledger::classify_kind`]; this type only names the outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    GithubCommit { commit: String, repo: String },
    FromSummary { summary_path: String },
    FreeForm { topic: String },
    TicketProcess { ticket_path: String },
    Unknown,
}

impl TaskKind {
    /// Routing label, also the remote `Type` property value.
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::GithubCommit { .. } => "github_commit",
            TaskKind::FromSummary { .. } => "from_summary",
            TaskKind::FreeForm { .. } => "free_form",
            TaskKind::TicketProcess { .. } => "ticket_process",
            TaskKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One task entry parsed from a ledger line.
///
/// `line_idx` is the ordering anchor: the 0-based index of the raw line this
/// record was parsed from. `raw` keeps the original line so single-field
/// edits can rewrite only what changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub line_idx: usize,
    pub status: TaskStatus,
    pub content: String,
    /// Generic ordered key/value pairs from the pipe-delimited metadata tail.
    /// Keys are not necessarily unique.
    pub metadata: Vec<(String, String)>,
    /// The raw metadata tail, untouched. Side-field scans run against this,
    /// independent of the generic pairs.
    pub metadata_raw: String,
    pub raw: String,
    pub kind: TaskKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Record {
    /// Human-readable 1-based line number.
    pub fn line_number(&self) -> usize {
        self.line_idx + 1
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
