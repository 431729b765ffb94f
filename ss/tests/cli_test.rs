//! CLI tests for the ss binary

use assert_cmd::Command;
use predicates::prelude::*;
use sessionstore::{SessionHeader, SessionStore};
use tempfile::TempDir;

fn seed(store_dir: &std::path::Path, id: &str, tags: &[&str]) {
    let store = SessionStore::open(store_dir).unwrap();
    let header = SessionHeader {
        id: id.to_string(),
        title: format!("Plan {}", id),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        created_at: 1_700_000_000_000,
        updated_at: 1_700_000_000_000,
        message_count: 2,
        has_plan: true,
    };
    store.save(&header, &vec!["hello".to_string(), "world".to_string()]).unwrap();
}

fn ss(store_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("ss").unwrap();
    cmd.arg("--store").arg(store_dir);
    cmd
}

#[test]
fn test_list_empty_store() {
    let temp = TempDir::new().unwrap();

    ss(temp.path())
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions found"));
}

#[test]
fn test_list_filters_by_tag() {
    let temp = TempDir::new().unwrap();
    seed(temp.path(), "alpha", &["work"]);
    seed(temp.path(), "beta", &["home"]);

    ss(temp.path())
        .args(["list", "--tag", "work"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha").and(predicate::str::contains("beta").not()));
}

#[test]
fn test_info_and_delete() {
    let temp = TempDir::new().unwrap();
    seed(temp.path(), "alpha", &[]);

    ss(temp.path())
        .args(["info", "alpha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Plan alpha"));

    ss(temp.path())
        .args(["delete", "alpha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted session"));

    ss(temp.path()).args(["info", "alpha"]).assert().failure();
}
