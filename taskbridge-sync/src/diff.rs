//! Dry-run unified diff for `taskbridge diff`.

use std::path::Path;

use similar::TextDiff;

use taskbridge_core::ledger::Ledger;

use crate::error::SyncError;
use crate::reconcile::plan_merge;
use crate::remote::{fetch_all, RemoteStore};

/// Render what merge would write to the ledger and compare it with what is
/// on disk. No files are written.
///
/// Returns `None` when merge would change nothing.
pub fn merge_diff(
    store: &mut dyn RemoteStore,
    ledger_path: &Path,
) -> Result<Option<String>, SyncError> {
    let remote = fetch_all(store)?;
    let ledger = Ledger::load(ledger_path)?;
    let plan = plan_merge(&ledger, &remote);
    if !plan.changed() {
        return Ok(None);
    }

    let old = ledger.render();
    let new = plan.lines.join("\n");
    let name = ledger_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ledger".to_owned());
    let old_header = format!("a/{name}");
    let new_header = format!("b/{name}");

    let unified = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();
    Ok(Some(unified))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use taskbridge_core::types::{RecordId, TaskStatus};

    use crate::remote::{MemoryStore, Projection};

    use super::*;

    #[test]
    fn no_diff_when_mirror_matches_ledger() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.md");
        fs::write(&path, "- [ ] [TODO] keep me\n").unwrap();

        let mut store = MemoryStore::new();
        store.seed(Projection::new(
            RecordId::from("TASK-001"),
            TaskStatus::Todo,
            "keep me",
            "unknown",
        ));

        let diff = merge_diff(&mut store, &path).unwrap();
        assert!(diff.is_none());
    }

    #[test]
    fn remote_status_change_produces_unified_diff() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tasks.md");
        fs::write(&path, "- [ ] [TODO] approve me\n").unwrap();

        let mut store = MemoryStore::new();
        store.seed(Projection::new(
            RecordId::from("TASK-001"),
            TaskStatus::Approved,
            "approve me",
            "unknown",
        ));

        let diff = merge_diff(&mut store, &path).unwrap().expect("diff");
        assert!(diff.contains("--- a/tasks.md"));
        assert!(diff.contains("+++ b/tasks.md"));
        assert!(diff.contains("-- [ ] [TODO] approve me"));
        assert!(diff.contains("+- [ ] [APPROVED] approve me"));
        // Nothing was written.
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "- [ ] [TODO] approve me\n"
        );
    }
}
