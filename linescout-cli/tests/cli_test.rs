use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn linescout() -> Command {
    Command::cargo_bin("linescout").unwrap()
}

fn create_test_files(dir: impl AsRef<Path>, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.as_ref().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }
}

#[test]
fn test_match_exits_zero() {
    let dir = tempdir().unwrap();
    create_test_files(&dir, &[("a.txt", "hello world\n")]);

    linescout()
        .arg("hello")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("hello world"));
}

#[test]
fn test_no_match_exits_one() {
    let dir = tempdir().unwrap();
    create_test_files(&dir, &[("a.txt", "nothing interesting\n")]);

    linescout()
        .arg("absent")
        .arg(dir.path())
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_bad_pattern_exits_two() {
    let dir = tempdir().unwrap();

    linescout()
        .arg("(unclosed")
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unmatched parenthesis"));
}

#[test]
fn test_count_mode() {
    let dir = tempdir().unwrap();
    create_test_files(&dir, &[("a.txt", "x\nx\ny\nx\n")]);

    linescout()
        .arg("-c")
        .arg("x")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt:3"));
}

#[test]
fn test_files_with_matches_mode() {
    let dir = tempdir().unwrap();
    create_test_files(&dir, &[("hit.txt", "x\nx\n"), ("miss.txt", "y\n")]);

    linescout()
        .arg("-l")
        .arg("x")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("hit.txt").and(predicate::str::contains("miss").not()));
}

#[test]
fn test_gitignore_respected_and_overridable() {
    let dir = tempdir().unwrap();
    create_test_files(
        &dir,
        &[(".gitignore", "*.log\n"), ("debug.log", "needle\n")],
    );

    linescout().arg("needle").arg(dir.path()).assert().code(1);

    linescout()
        .arg("--no-ignore")
        .arg("needle")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("debug.log"));
}

#[test]
fn test_ignore_case_flag() {
    let dir = tempdir().unwrap();
    create_test_files(&dir, &[("a.txt", "Needle In Caps\n")]);

    linescout().arg("needle").arg(dir.path()).assert().code(1);

    linescout()
        .arg("-i")
        .arg("needle")
        .arg(dir.path())
        .assert()
        .success();
}

#[test]
fn test_glob_filter() {
    let dir = tempdir().unwrap();
    create_test_files(&dir, &[("a.rs", "needle\n"), ("a.py", "needle\n")]);

    linescout()
        .arg("-g")
        .arg("*.rs")
        .arg("needle")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("a.rs").and(predicate::str::contains("a.py").not()));
}

#[test]
fn test_heading_flag() {
    let dir = tempdir().unwrap();
    create_test_files(&dir, &[("a.txt", "one needle\ntwo needle\n")]);

    linescout()
        .arg("--heading")
        .arg("needle")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt\n1:one needle\n2:two needle\n"));
}

#[test]
fn test_word_boundary_flag() {
    let dir = tempdir().unwrap();
    create_test_files(&dir, &[("a.txt", "preneedle\n")]);

    linescout().arg("-w").arg("needle").arg(dir.path()).assert().code(1);
    linescout().arg("needle").arg(dir.path()).assert().success();
}

#[test]
fn test_missing_pattern_is_usage_error() {
    linescout().assert().code(2);
}
