// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 seqflow contributors

//! End-to-end tests of the seqflow binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const DEMO: &str = r#"
version: "1"
name: demo
source:
  - count_from: { start: 1 }
  - slice: { stop: 3 }
  - split:
      branches:
        - [ { scale: { factor: 2 } } ]
        - [ { sum: {} } ]
"#;

fn seqflow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("seqflow").unwrap();
    cmd.current_dir(dir.path()).env("NO_COLOR", "1");
    cmd
}

fn project(pipeline: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".seqflow.yaml"), pipeline).unwrap();
    dir
}

#[test]
fn test_run_prints_items() {
    let dir = project(DEMO);
    seqflow(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout("2.0\n4.0\n6.0\n6\n");
}

#[test]
fn test_run_json_lines_with_limit() {
    let dir = project(
        r#"
name: labelled
source:
  - count_from: {}
  - update_context: { merge: { run: { id: 7 } } }
"#,
    );
    seqflow(&dir)
        .args(["run", "--json", "--limit", "2"])
        .assert()
        .success()
        .stdout(
            "{\"context\":{\"run\":{\"id\":7}},\"data\":0}\n\
             {\"context\":{\"run\":{\"id\":7}},\"data\":1}\n",
        );
}

#[test]
fn test_run_toml_pipeline() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("mean.toml"),
        "name = \"mean\"\n\n[[source]]\nvalues = [2, 4]\n\n[[source]]\nmean = {}\n",
    )
    .unwrap();
    seqflow(&dir)
        .args(["run", "mean.toml"])
        .assert()
        .success()
        .stdout("3.0\n");
}

#[test]
fn test_run_reports_composition_error() {
    let dir = project("name: bad\nsource:\n  - sum: {}\n");
    seqflow(&dir)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Element 0 (sum)"))
        .stderr(predicate::str::contains("Start the Source with a generating element"));
}

#[test]
fn test_run_reports_invalid_value() {
    let dir = project("name: words\nsource:\n  - values: [1, \"two\", 3]\n  - scale: { factor: 2 }\n");
    seqflow(&dir)
        .arg("run")
        .assert()
        .failure()
        .stdout("2.0\n")
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_validate_valid_pipeline() {
    let dir = project(DEMO);
    seqflow(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Pipeline is valid!"));
}

#[test]
fn test_validate_warns_about_unbounded_source() {
    let dir = project("name: forever\nsource:\n  - count_from: {}\n");
    seqflow(&dir)
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("never ends"))
        .stdout(predicate::str::contains("valid but has warnings"));
}

#[test]
fn test_validate_missing_file() {
    let dir = TempDir::new().unwrap();
    seqflow(&dir)
        .arg("validate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_graph_mermaid() {
    let dir = project(DEMO);
    seqflow(&dir)
        .args(["graph", "--format", "mermaid"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("graph TD"))
        .stdout(predicate::str::contains("n2 --> n3"))
        .stdout(predicate::str::contains("n2 --> n4"));
}

#[test]
fn test_init_then_run() {
    let dir = TempDir::new().unwrap();
    seqflow(&dir)
        .args(["init", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created .seqflow.yaml"));

    seqflow(&dir).args(["init", "demo"]).assert().failure();

    seqflow(&dir)
        .arg("run")
        .assert()
        .success()
        .stdout("2.0\n4.0\n6.0\n8.0\n10.0\n15\n");
}

#[test]
fn test_change_directory_flag() {
    let dir = project(DEMO);
    let mut cmd = Command::cargo_bin("seqflow").unwrap();
    cmd.env("NO_COLOR", "1")
        .arg("-C")
        .arg(dir.path())
        .args(["run", "-n", "1"])
        .assert()
        .success()
        .stdout("2.0\n");
}
