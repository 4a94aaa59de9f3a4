//! End-to-end tests for the ledger-local commands (no network involved).

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const LEDGER: &str = "\
# Tasks

<!-- Your tasks go here -->
- [ ] [TODO] Write about: launch day | draft: data/drafts/launch.md
- [ ] [PROCESSING] Summarize commit abc123 in repo acme/site
- [ ] [DONE] summary: data/summaries/week1.md
";

const TICKET: &str = "\
---
id: TKT-001
status: ready
locked_by: \"\"
locked_at: \"\"
---
# Launch post
";

fn taskbridge(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("taskbridge").expect("binary");
    cmd.env("HOME", home);
    cmd
}

/// Fake home with an initialized config pointing at a ledger inside it.
fn setup() -> (TempDir, PathBuf) {
    let home = TempDir::new().expect("home");
    let data = home.path().join("pipeline").join("data");
    fs::create_dir_all(&data).expect("mkdir");
    let ledger = data.join("tasks.md");
    fs::write(&ledger, LEDGER).expect("ledger");

    taskbridge(home.path())
        .args(["init"])
        .arg(&ledger)
        .assert()
        .success();
    (home, ledger)
}

#[test]
fn init_scaffolds_config() {
    let (home, _ledger) = setup();
    let config = home.path().join(".taskbridge").join("config.yaml");
    assert!(config.exists());
    let yaml = fs::read_to_string(config).unwrap();
    assert!(yaml.contains("tasks.md"));
    assert!(yaml.contains("TASKBRIDGE_TOKEN"));
}

#[test]
fn status_lists_parsed_records() {
    let (home, _ledger) = setup();
    taskbridge(home.path())
        .args(["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 record(s)"))
        .stdout(predicate::str::contains("free_form"))
        .stdout(predicate::str::contains("github_commit"));
}

#[test]
fn status_json_is_machine_readable() {
    let (home, _ledger) = setup();
    let output = taskbridge(home.path())
        .args(["status", "--json", "--status", "TODO"])
        .output()
        .expect("run");
    assert!(output.status.success());

    let records: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("valid JSON");
    let records = records.as_array().expect("array");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "TODO");
    assert_eq!(records[0]["kind"]["type"], "free_form");
}

#[test]
fn update_by_line_rewrites_the_status() {
    let (home, ledger) = setup();
    taskbridge(home.path())
        .args(["update", "--line", "4", "--status", "WAITING_APPROVAL"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated line 4"));

    let on_disk = fs::read_to_string(&ledger).unwrap();
    assert!(on_disk.contains("- [ ] [WAITING_APPROVAL] Write about: launch day | draft: data/drafts/launch.md"));
}

#[test]
fn update_by_match_finds_the_task() {
    let (home, ledger) = setup();
    taskbridge(home.path())
        .args(["update", "--match", "summarize commit", "--status", "DONE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found task at line 5"));

    let on_disk = fs::read_to_string(&ledger).unwrap();
    assert!(on_disk.contains("- [ ] [DONE] Summarize commit abc123"));
}

#[test]
fn update_append_metadata_combines_tails() {
    let (home, ledger) = setup();
    taskbridge(home.path())
        .args([
            "update",
            "--line",
            "4",
            "--status",
            "WAITING_APPROVAL",
            "--metadata",
            "published: https://example.com/p/9",
            "--append-metadata",
        ])
        .assert()
        .success();

    let on_disk = fs::read_to_string(&ledger).unwrap();
    assert!(on_disk
        .contains("draft: data/drafts/launch.md, published: https://example.com/p/9"));
}

#[test]
fn update_nonexistent_line_fails_cleanly() {
    let (home, ledger) = setup();
    let before = fs::read_to_string(&ledger).unwrap();
    taskbridge(home.path())
        .args(["update", "--line", "1", "--status", "DONE"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a task line"));
    assert_eq!(fs::read_to_string(&ledger).unwrap(), before);
}

#[test]
fn lock_then_second_lock_is_denied() {
    let (home, _ledger) = setup();
    let ticket = home.path().join("TKT-001.md");
    fs::write(&ticket, TICKET).unwrap();

    taskbridge(home.path())
        .args(["lock"])
        .arg(&ticket)
        .args(["--agent", "writer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lock acquired by writer"));

    taskbridge(home.path())
        .args(["lock"])
        .arg(&ticket)
        .args(["--agent", "publisher"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already held by writer"));
}

#[test]
fn unlock_clears_the_lock_for_any_agent() {
    let (home, _ledger) = setup();
    let ticket = home.path().join("TKT-001.md");
    fs::write(&ticket, TICKET).unwrap();

    taskbridge(home.path())
        .args(["lock"])
        .arg(&ticket)
        .args(["--agent", "writer"])
        .assert()
        .success();
    taskbridge(home.path())
        .args(["unlock"])
        .arg(&ticket)
        .assert()
        .success();
    taskbridge(home.path())
        .args(["lock"])
        .arg(&ticket)
        .args(["--agent", "publisher"])
        .assert()
        .success();
}

#[test]
fn fail_command_marks_and_unlocks_atomically() {
    let (home, _ledger) = setup();
    let ticket = home.path().join("TKT-001.md");
    fs::write(&ticket, TICKET).unwrap();

    taskbridge(home.path())
        .args(["lock"])
        .arg(&ticket)
        .args(["--agent", "publisher"])
        .assert()
        .success();
    taskbridge(home.path())
        .args(["fail"])
        .arg(&ticket)
        .args(["--error", "rate limited"])
        .assert()
        .success();

    let on_disk = fs::read_to_string(&ticket).unwrap();
    assert!(on_disk.contains("status: failed"));
    assert!(on_disk.contains("error: \"rate limited\""));
    assert!(on_disk.contains("retry_count: 1"));
    assert!(on_disk.contains("locked_by: \"\""));
}

#[test]
fn field_command_updates_a_single_header_field() {
    let (home, _ledger) = setup();
    let ticket = home.path().join("TKT-001.md");
    fs::write(&ticket, TICKET).unwrap();

    taskbridge(home.path())
        .args(["field"])
        .arg(&ticket)
        .args(["--field", "status", "--value", "approved"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated status = approved"));

    let on_disk = fs::read_to_string(&ticket).unwrap();
    assert!(on_disk.contains("status: approved"));
}

#[test]
fn field_command_refuses_headerless_documents() {
    let (home, _ledger) = setup();
    let plain = home.path().join("plain.md");
    fs::write(&plain, "# no header\n").unwrap();

    taskbridge(home.path())
        .args(["field"])
        .arg(&plain)
        .args(["--field", "status", "--value", "x"])
        .assert()
        .failure();
    assert_eq!(fs::read_to_string(&plain).unwrap(), "# no header\n");
}

#[test]
fn commands_require_a_config() {
    let home = TempDir::new().unwrap();
    taskbridge(home.path())
        .args(["status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("taskbridge init"));
}
