//! Binary-level smoke tests for the `pf` CLI, limited to subcommands
//! that need no API key.

use assert_cmd::Command;
use predicates::prelude::*;

use planforge::cli::PlanFile;
use planforge::domain::{Task, TaskId, TaskType};

#[test]
fn classify_reports_complexity() {
    Command::cargo_bin("pf")
        .unwrap()
        .args(["classify", "small chore"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complexity: low"));

    Command::cargo_bin("pf")
        .unwrap()
        .args(["classify", "Redesign the platform", "--description", "migrate the architecture"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complexity: high"))
        .stdout(predicate::str::contains("type at depth 0: root"));
}

#[test]
fn schedule_orders_a_saved_plan() {
    let root = Task::new_root(TaskId(1), "root goal");
    let phase = Task::new_child(TaskId(2), &root, "phase one", TaskType::Composite, 100);
    let leaf = Task::new_child(TaskId(3), &phase, "leaf work", TaskType::Atomic, 100);
    let file = PlanFile {
        tasks: vec![root, phase, leaf],
        links: Vec::new(),
    };

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plan.json");
    std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

    // Postorder lists the leaf before its ancestors
    let output = Command::cargo_bin("pf")
        .unwrap()
        .args(["schedule", "--input", path.to_str().unwrap(), "--strategy", "postorder"])
        .assert()
        .success()
        .stdout(predicate::str::contains("leaf work"))
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).unwrap();
    let leaf_at = text.find("leaf work").unwrap();
    let root_at = text.find("root goal").unwrap();
    assert!(leaf_at < root_at);

    Command::cargo_bin("pf")
        .unwrap()
        .args(["schedule", "--input", path.to_str().unwrap(), "--strategy", "bfs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("root goal"));
}

#[test]
fn schedule_rejects_unknown_strategy() {
    Command::cargo_bin("pf")
        .unwrap()
        .args(["schedule", "--input", "plan.json", "--strategy", "mystery"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown strategy"));
}
