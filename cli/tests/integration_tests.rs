//! Integration tests for the reposum CLI
//!
//! These tests verify the CLI commands work correctly with real filesystem operations.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Helper to create a test repository structure
fn create_test_repo() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path();

    fs::create_dir_all(base.join("src")).unwrap();
    fs::create_dir_all(base.join("docs")).unwrap();
    fs::create_dir_all(base.join("node_modules/left-pad")).unwrap();
    fs::create_dir_all(base.join(".github/workflows")).unwrap();

    fs::write(
        base.join("README.md"),
        r#"# Greeter

[![CI](https://img.shields.io/badge/ci-passing-green.svg)](https://example.com)

Greeter says hello from the command line.

## Installation

Run `pip install greeter`.

## Contributing

Pull requests are welcome.
"#,
    )
    .unwrap();

    fs::write(
        base.join("package.json"),
        r#"{
  "name": "greeter-web",
  "dependencies": {
    "express": "^4.18.2",
    "lodash": "^4.17.21"
  },
  "devDependencies": {
    "jest": "^29.0.0"
  }
}
"#,
    )
    .unwrap();

    fs::write(base.join("package-lock.json"), "{\n  \"lockfileVersion\": 3\n}\n").unwrap();

    fs::write(
        base.join("src/app.py"),
        r#""""Greeter entry point."""
import argparse


def greet(name):
    return "Hello, " + name


def main():
    parser = argparse.ArgumentParser()
    parser.add_argument("name")
    print(greet(parser.parse_args().name))


if __name__ == "__main__":
    main()
"#,
    )
    .unwrap();

    fs::write(
        base.join(".github/workflows/ci.yml"),
        "# CI pipeline\nname: ci\non: [push]\njobs:\n  test:\n    runs-on: ubuntu-latest\n",
    )
    .unwrap();

    fs::write(base.join("docs/CHANGELOG.md"), "# Changelog\n\n\n\n## 1.0.0\n\nFirst release.\n").unwrap();
    fs::write(base.join("node_modules/left-pad/index.js"), "module.exports = pad;\n").unwrap();

    temp_dir
}

fn reposum() -> Command {
    Command::cargo_bin("reposum").unwrap()
}

#[test]
fn test_help_command() {
    reposum()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("token budget"));
}

#[test]
fn test_version_command() {
    reposum().arg("--version").assert().success().stdout(predicate::str::contains("reposum"));
}

#[test]
fn test_pack_text_output() {
    let temp = create_test_repo();

    reposum()
        .arg("pack")
        .arg(temp.path())
        .args(["--name", "greeter"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--- README.md (readme) ---"))
        .stdout(predicate::str::contains("## Installation"))
        .stdout(predicate::str::contains("--- detected facts ---"))
        .stdout(predicate::str::contains("npm dependencies (3): express, jest, lodash"))
        .stdout(predicate::str::contains("--- src/app.py (entry-point) ---"))
        .stdout(predicate::str::contains("def greet(name):"))
        .stdout(predicate::str::contains("--- .github/workflows/ci.yml (ci-cd) ---"))
        .stdout(predicate::str::contains("## Contributing").not())
        .stdout(predicate::str::contains("shields.io").not())
        .stdout(predicate::str::contains("package-lock.json").not())
        .stdout(predicate::str::contains("left-pad").not());
}

#[test]
fn test_pack_json_output() {
    let temp = create_test_repo();

    let output = reposum()
        .arg("pack")
        .arg(temp.path())
        .args(["--name", "greeter", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let blob = json["context"]["blob"].as_str().unwrap();
    assert!(blob.contains("--- README.md (readme) ---"));
    assert!(json["context"]["total_tokens_used"].as_u64().unwrap() <= 3200);
    assert_eq!(json["report"]["filtered"].as_u64(), Some(2));

    let frameworks = json["context"]["facts"]["frameworks"].as_array().unwrap();
    assert!(frameworks.iter().any(|f| f == "Express.js"));

    let decisions = json["report"]["decisions"].as_array().unwrap();
    let app = decisions.iter().find(|d| d["path"] == "src/app.py").unwrap();
    assert_eq!(app["category"], "entry_point_candidate");
    assert_eq!(app["score"], 50);
    assert_eq!(app["outcome"], "included");
}

#[test]
fn test_pack_respects_budget_flags() {
    let temp = create_test_repo();

    let output = reposum()
        .arg("pack")
        .arg(temp.path())
        .args(["--max-tokens", "300", "--reserved", "100", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert!(json["context"]["total_tokens_used"].as_u64().unwrap() <= 200);
    assert_eq!(json["report"]["budget"]["total"], 300);
}

#[test]
fn test_pack_rejects_invalid_budget() {
    let temp = create_test_repo();

    reposum()
        .arg("pack")
        .arg(temp.path())
        .args(["--max-tokens", "100", "--reserved", "200"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reserved_tokens"));
}

#[test]
fn test_pack_explain() {
    let temp = create_test_repo();

    reposum()
        .arg("pack")
        .arg(temp.path())
        .args(["--name", "greeter", "--explain"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Selection Report"))
        .stderr(predicate::str::contains("src/app.py"))
        .stderr(predicate::str::contains("score 50"))
        .stderr(predicate::str::contains("Filtered:  2 files"));
}

#[test]
fn test_pack_to_output_file() {
    let temp = create_test_repo();
    let out = temp.path().join("context.txt");

    reposum()
        .arg("pack")
        .arg(temp.path())
        .arg("--output")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let written = fs::read_to_string(&out).unwrap();
    assert!(written.contains("--- detected facts ---"));
}

#[test]
fn test_pack_with_config_file() {
    let temp = create_test_repo();
    fs::write(
        temp.path().join(".reposum.toml"),
        "max_tokens = 1000\nreserved_tokens = 200\n\n[selection]\nmax_docs = 0\n",
    )
    .unwrap();

    let output = reposum()
        .arg("pack")
        .arg(temp.path())
        .args(["--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["report"]["budget"]["total"], 1000);
    let decisions = json["report"]["decisions"].as_array().unwrap();
    assert!(decisions.iter().all(|d| d["category"] != "documentation"));
}

#[test]
fn test_pack_missing_repository() {
    reposum()
        .arg("pack")
        .arg("/definitely/not/a/repo")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Repository not found"));
}

#[test]
fn test_classify_command() {
    let temp = create_test_repo();

    reposum()
        .arg("classify")
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("README.md"))
        .stdout(predicate::str::contains("package-config"))
        .stdout(predicate::str::contains("node_modules/left-pad/index.js"))
        .stdout(predicate::str::contains("excluded"));
}

#[test]
fn test_classify_json() {
    let temp = create_test_repo();

    let output = reposum().arg("classify").arg(temp.path()).arg("--json").output().unwrap();
    assert!(output.status.success());

    let entries: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    let category = |path: &str| {
        entries.iter().find(|e| e["path"] == path).map(|e| e["category"].clone())
    };
    assert_eq!(category("README.md"), Some("readme".into()));
    assert_eq!(category("package-lock.json"), Some("excluded".into()));
    assert_eq!(category(".github/workflows/ci.yml"), Some("ci_cd_config".into()));
    assert_eq!(category("docs/CHANGELOG.md"), Some("documentation".into()));
}

#[test]
fn test_init_creates_config() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".reposum.toml");

    reposum()
        .arg("init")
        .arg("--output")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("max_tokens = 4000"));
    assert!(content.contains("[shares]"));
}

#[test]
fn test_init_refuses_to_overwrite() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("reposum.yaml");
    fs::write(&path, "max_tokens: 100\n").unwrap();

    reposum()
        .args(["init", "--format", "yaml", "--output"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    reposum()
        .args(["init", "--format", "yaml", "--force", "--output"])
        .arg(&path)
        .assert()
        .success();
    assert!(fs::read_to_string(&path).unwrap().contains("max_tokens: 4000"));
}
