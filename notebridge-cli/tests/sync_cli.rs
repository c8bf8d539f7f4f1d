use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn notebridge_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("notebridge"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG");
    cmd
}

fn init(home: &Path) -> (PathBuf, PathBuf) {
    let org = home.join("notes/org");
    let vault = home.join("notes/vault");
    notebridge_cmd(home)
        .args(["init", "--org-dir"])
        .arg(&org)
        .arg("--markdown-dir")
        .arg(&vault)
        .args(["--exclude", "archive/*"])
        .assert()
        .success()
        .stdout(contains("Configured notebridge"));
    (org, vault)
}

#[test]
fn init_creates_trees_and_refuses_to_clobber() {
    let home = TempDir::new().expect("home");
    let (org, vault) = init(home.path());
    assert!(org.is_dir());
    assert!(vault.is_dir());

    let yaml = fs::read_to_string(home.path().join(".notebridge/config.yaml")).expect("config");
    assert!(yaml.contains("archive/*"));

    notebridge_cmd(home.path())
        .args(["init", "--org-dir"])
        .arg(&org)
        .arg("--markdown-dir")
        .arg(&vault)
        .assert()
        .failure()
        .stderr(contains("--force"));
}

#[test]
fn init_rejects_nested_roots() {
    let home = TempDir::new().expect("home");
    let org = home.path().join("notes");
    notebridge_cmd(home.path())
        .args(["init", "--org-dir"])
        .arg(&org)
        .arg("--markdown-dir")
        .arg(org.join("vault"))
        .assert()
        .failure()
        .stderr(contains("nested"));
}

#[test]
fn sync_without_config_points_at_init() {
    let home = TempDir::new().expect("home");
    notebridge_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("notebridge init"));
}

#[test]
fn dry_run_reports_and_writes_nothing() {
    let home = TempDir::new().expect("home");
    let (org, vault) = init(home.path());
    fs::write(org.join("todo.org"), "* TODO Ship it\n").expect("seed");

    notebridge_cmd(home.path())
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run] Sync complete: 1 files synced"))
        .stdout(contains("todo.md"));

    assert!(fs::read_dir(&vault).expect("vault").next().is_none());
    assert!(!home.path().join(".notebridge/state.json").exists());
}

#[test]
fn sync_writes_counterparts_and_is_idempotent() {
    let home = TempDir::new().expect("home");
    let (org, vault) = init(home.path());
    fs::write(org.join("a.org"), "* Alpha\n").expect("org note");
    fs::write(vault.join("b.md"), "# Beta\n").expect("md note");
    fs::create_dir_all(org.join("archive")).expect("archive");
    fs::write(org.join("archive/old.org"), "* Old\n").expect("archived");

    notebridge_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("Sync complete: 2 files synced, 0 conflicts, 0 errors"));

    assert_eq!(fs::read_to_string(vault.join("a.md")).expect("a.md"), "# Alpha\n");
    assert_eq!(fs::read_to_string(org.join("b.org")).expect("b.org"), "* Beta\n");
    assert!(!vault.join("archive/old.md").exists());
    assert!(home.path().join(".notebridge/state.json").exists());
    let holder = fs::read_to_string(home.path().join(".notebridge/state.lock")).unwrap_or_default();
    assert_eq!(holder, "", "lock holder cleared after the pass");

    notebridge_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("Sync complete: 0 files synced"));
}

#[test]
fn failed_pairs_are_listed_and_exit_nonzero() {
    let home = TempDir::new().expect("home");
    let (org, vault) = init(home.path());
    fs::write(org.join("broken.org"), ":PROPERTIES:\n:ID: abc\n").expect("broken");
    fs::write(org.join("fine.org"), "* Fine\n").expect("fine");

    notebridge_cmd(home.path())
        .arg("sync")
        .assert()
        .code(1)
        .stdout(contains("1 errors"))
        .stdout(contains("broken.org"))
        .stderr(contains("1 note pair(s) failed to sync"));

    assert!(vault.join("fine.md").exists());
}

#[test]
fn reindex_records_note_ids() {
    let home = TempDir::new().expect("home");
    let (_org, vault) = init(home.path());
    fs::write(
        vault.join("ideas.md"),
        "---\nid: 5f0c7d2e-1111-4222-8333-444455556666\n---\n# Ideas\n",
    )
    .expect("seed");

    notebridge_cmd(home.path())
        .args(["sync", "--reindex"])
        .assert()
        .success()
        .stdout(contains("Indexed note ids (1 new or renamed)"));

    let state = fs::read_to_string(home.path().join(".notebridge/state.json")).expect("state");
    assert!(state.contains("5f0c7d2e-1111-4222-8333-444455556666"));
}
