//! Ledger document parser and serializer.
//!
//! # Line grammar
//!
//! ```text
//! - [ ] [STATUS] <content> | key1: value1, key2: value2
//! ```
//!
//! # Header-block grammar
//!
//! ```text
//! ---
//! key: value
//! key2: "quoted value"
//! ---
//! ```
//!
//! Parsing is intentionally permissive: malformed task lines are skipped and
//! an unclosed header block degrades to "no header" — a noisy document never
//! blocks processing. Mutating operations that *require* the header use
//! [`locate_header`], which is strict.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::LedgerError;
use crate::types::{Record, TaskKind, TaskStatus};

/// Inbound records appended by the reconciler land directly below this line.
pub const INSERTION_MARKER: &str = "<!-- Your tasks go here -->";

static TASK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- \[ \] \[(.*?)\] (.*?)(?:\s*\|\s*(.*))?$").expect("task line regex is valid")
});

// Kind classification patterns. Checked in declaration order, first match
// wins — the precedence determines downstream routing.
static COMMIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)commit\s+([a-f0-9]+)").expect("commit regex is valid"));
static REPO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)repo\s+([\w\-]+/[\w\-]+)").expect("repo regex is valid"));
static SUMMARY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"summary:\s*(.+\.md)").expect("summary regex is valid"));
static TOPIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)write about:\s*(.+)").expect("topic regex is valid"));
static TICKET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ticket:\s*(data/tickets/.+\.md)").expect("ticket regex is valid")
});

// Side-field scans over the raw metadata tail.
static DRAFT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"draft:\s*(\S+)").expect("draft regex is valid"));
static PUBLISHED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"published:\s*(\S+)").expect("published regex is valid"));
static ERROR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"error:\s*(.+)").expect("error regex is valid"));

// ---------------------------------------------------------------------------
// Header block
// ---------------------------------------------------------------------------

/// A parsed `--- … ---` header block at the top of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderBlock {
    /// Ordered `key: value` pairs as they appear. Duplicate keys allowed.
    pub fields: Vec<(String, String)>,
    /// Line index of the opening delimiter.
    pub open_idx: usize,
    /// Line index of the closing delimiter.
    pub close_idx: usize,
}

impl HeaderBlock {
    /// Look up a field value. The last occurrence of a duplicated key wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn parse(lines: &[String]) -> Option<HeaderBlock> {
        let (open_idx, close_idx) = match locate_header(lines) {
            Ok(span) => span,
            Err(_) => return None,
        };

        let mut fields = Vec::new();
        for line in &lines[open_idx + 1..close_idx] {
            if !line.contains(':') || line.trim_start().starts_with('-') {
                continue;
            }
            let (key, value) = line.split_once(':').expect("colon presence checked");
            fields.push((key.trim().to_owned(), unquote(value.trim()).to_owned()));
        }
        Some(HeaderBlock {
            fields,
            open_idx,
            close_idx,
        })
    }
}

/// Find the header block delimiters, strictly.
///
/// Errors with [`LedgerError::MissingHeader`] when the document does not open
/// with `---`, and [`LedgerError::UnclosedHeader`] when no closing delimiter
/// exists. Mutating operations use this; plain parsing does not.
pub fn locate_header(lines: &[String]) -> Result<(usize, usize), LedgerError> {
    match lines.first() {
        Some(first) if first.trim() == "---" => {}
        _ => return Err(LedgerError::MissingHeader),
    }
    for (idx, line) in lines.iter().enumerate().skip(1) {
        if line.trim() == "---" {
            return Ok((0, idx));
        }
    }
    Err(LedgerError::UnclosedHeader)
}

fn unquote(value: &str) -> &str {
    let stripped = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')));
    stripped.unwrap_or(value)
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// A parsed ledger: ordered records plus the raw line buffer they came from.
///
/// `render()` reproduces the document byte-for-byte; mutations edit single
/// lines in `lines` and re-render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ledger {
    pub header: Option<HeaderBlock>,
    pub records: Vec<Record>,
    pub lines: Vec<String>,
}

impl Ledger {
    /// Parse a document. Never fails: noise is skipped, not fatal.
    pub fn parse(text: &str) -> Ledger {
        let lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        let header = HeaderBlock::parse(&lines);
        let skip_until = header.as_ref().map(|h| h.close_idx);

        let mut records = Vec::new();
        for (line_idx, line) in lines.iter().enumerate() {
            if let Some(close) = skip_until {
                if line_idx <= close {
                    continue;
                }
            }
            if let Some(record) = parse_record(line_idx, line) {
                records.push(record);
            }
        }

        Ledger {
            header,
            records,
            lines,
        }
    }

    /// Read and parse a ledger file.
    pub fn load(path: &Path) -> Result<Ledger, LedgerError> {
        if !path.exists() {
            return Err(LedgerError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|e| LedgerError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Ledger::parse(&text))
    }

    /// Serialize back to document text. `parse(text).render() == text`.
    pub fn render(&self) -> String {
        self.lines.join("\n")
    }

    /// Index of the line directly below the insertion marker, or `None`
    /// when the document carries no marker.
    pub fn insertion_point(&self) -> Option<usize> {
        self.lines
            .iter()
            .position(|line| line.contains(INSERTION_MARKER))
            .map(|idx| idx + 1)
    }
}

fn parse_record(line_idx: usize, line: &str) -> Option<Record> {
    let caps = TASK_LINE.captures(line.trim())?;
    let status = TaskStatus::parse(caps.get(1).map_or("", |m| m.as_str()).trim());
    let content = caps.get(2).map_or("", |m| m.as_str()).trim().to_owned();
    let metadata_raw = caps.get(3).map_or("", |m| m.as_str()).trim().to_owned();

    let draft_path = DRAFT_RE
        .captures(&metadata_raw)
        .map(|c| c[1].to_owned());
    let published_url = PUBLISHED_RE
        .captures(&metadata_raw)
        .map(|c| c[1].to_owned());
    let error = ERROR_RE.captures(&metadata_raw).map(|c| c[1].to_owned());

    Some(Record {
        line_idx,
        status,
        kind: classify_kind(&content),
        metadata: parse_metadata_pairs(&metadata_raw),
        metadata_raw,
        raw: line.trim_end().to_owned(),
        draft_path,
        published_url,
        error,
        content,
    })
}

/// Generic comma-separated `key: value` pairs. Values containing commas
/// belong to the targeted side-field scans, not this map.
fn parse_metadata_pairs(metadata: &str) -> Vec<(String, String)> {
    metadata
        .split(',')
        .filter_map(|chunk| chunk.split_once(':'))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .collect()
}

/// Classify record content into a routing kind.
///
/// Precedence: commit+repo reference, then summary-file reference, then
/// free-text topic directive, then ticket-file reference, then unknown.
/// First match wins.
pub fn classify_kind(content: &str) -> TaskKind {
    if let (Some(commit), Some(repo)) = (COMMIT_RE.captures(content), REPO_RE.captures(content)) {
        return TaskKind::GithubCommit {
            commit: commit[1].to_owned(),
            repo: repo[1].to_owned(),
        };
    }
    if let Some(caps) = SUMMARY_RE.captures(content) {
        return TaskKind::FromSummary {
            summary_path: caps[1].to_owned(),
        };
    }
    if let Some(caps) = TOPIC_RE.captures(content) {
        return TaskKind::FreeForm {
            topic: caps[1].to_owned(),
        };
    }
    if let Some(caps) = TICKET_RE.captures(content) {
        return TaskKind::TicketProcess {
            ticket_path: caps[1].to_owned(),
        };
    }
    TaskKind::Unknown
}

// ---------------------------------------------------------------------------
// Line-level serializers
// ---------------------------------------------------------------------------

/// Build a task line from parts.
pub fn format_task_line(status: &TaskStatus, content: &str, metadata: &str) -> String {
    if metadata.is_empty() {
        format!("- [ ] [{status}] {content}")
    } else {
        format!("- [ ] [{status}] {content} | {metadata}")
    }
}

/// Swap the status tag in a raw line, leaving everything else untouched.
/// Only the first occurrence is replaced.
pub fn replace_status(raw: &str, old: &TaskStatus, new: &TaskStatus) -> String {
    raw.replacen(&format!("[{old}]"), &format!("[{new}]"), 1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
