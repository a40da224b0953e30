//! CLI integration tests using assert_cmd.

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn gradebook(dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("gradebook").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("GRADEBOOK_PATH")
        .env_remove("GRADEBOOK_ROSTER")
        .env("HOME", dir.path());
    cmd
}

fn definitions() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../definitions")
}

#[test]
fn validate_definitions_directory() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir)
        .arg("--roster")
        .arg(definitions().join("roster.toml"))
        .arg("validate")
        .arg(definitions())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Quiz: Ownership basics (3 questions, 10 marks)",
        ))
        .stdout(predicate::str::contains(
            "Rubric: Lab report (3 criteria, 25 marks)",
        ))
        .stdout(predicate::str::contains("Roster:"))
        .stdout(predicate::str::contains("All definitions valid."));
}

#[test]
fn validate_without_roster_skips_selection_check() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir)
        .arg("validate")
        .arg(definitions().join("ownership-quiz.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("All definitions valid."));
}

#[test]
fn validate_reports_every_bad_question() {
    let dir = TempDir::new().unwrap();
    let quiz = dir.path().join("bad.toml");
    std::fs::write(
        &quiz,
        r#"
[quiz]
title = "Broken"
class_semester = "CS-2A"

[[questions]]
text = "Pick one"
type = "mcq"
options = [{ text = "a", correct = true }, { text = "b", correct = true }]

[[questions]]
text = "Yes or no?"
type = "true_false"
answer = "maybe"
"#,
    )
    .unwrap();

    gradebook(&dir)
        .arg("validate")
        .arg(&quiz)
        .assert()
        .failure()
        .stdout(predicate::str::contains("MultipleCorrectOptions"))
        .stdout(predicate::str::contains("InvalidAnswerLiteral"))
        .stderr(predicate::str::contains("1 of 1 definition file(s) invalid"));
}

#[test]
fn validate_rejects_unknown_student() {
    let dir = TempDir::new().unwrap();
    let quiz = dir.path().join("quiz.toml");
    std::fs::write(
        &quiz,
        r#"
[quiz]
title = "Cross-class"
class_semester = "CS-2A"
access = "selected_students"
students = ["s1", "s9"]

[[questions]]
text = "Rust has a garbage collector."
type = "tf"
answer = "False"
"#,
    )
    .unwrap();

    gradebook(&dir)
        .arg("--roster")
        .arg(definitions().join("roster.toml"))
        .arg("validate")
        .arg(&quiz)
        .assert()
        .failure()
        .stdout(predicate::str::contains("UnknownStudent"));
}

#[test]
fn validate_nonexistent_file() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir)
        .arg("validate")
        .arg("nonexistent.toml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn score_with_rubric() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir)
        .args(["score", "--rubric"])
        .arg(definitions().join("lab-rubric.toml"))
        .args(["--score", "method=8", "--score", "results=6", "--score", "writing=5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total: 19 / 25 (76%) PASS"));
}

#[test]
fn score_out_of_range_is_not_clamped() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir)
        .args(["score", "--rubric"])
        .arg(definitions().join("lab-rubric.toml"))
        .args(["--score", "method=11"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be between 0 and 10"));
}

#[test]
fn score_manual_marks_as_json() {
    let dir = TempDir::new().unwrap();
    let output = gradebook(&dir)
        .args(["score", "--marks", "7", "--max", "10", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["total"], 7.0);
    assert_eq!(json["percentage"], 70.0);
    assert_eq!(json["pass"], true);
}

#[test]
fn score_requires_a_scheme() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir)
        .arg("score")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--rubric"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    gradebook(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created gradebook.toml"))
        .stdout(predicate::str::contains("Created definitions/quiz.toml"));

    assert!(dir.path().join("gradebook.toml").exists());
    assert!(dir.path().join("definitions/rubric.toml").exists());
    assert!(dir.path().join("definitions/roster.toml").exists());
}

#[test]
fn init_output_validates() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir).arg("init").assert().success();

    // The generated gradebook.toml points at the generated roster.
    gradebook(&dir)
        .args(["validate", "definitions"])
        .assert()
        .success()
        .stdout(predicate::str::contains("All definitions valid."));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir).arg("init").assert().success();

    gradebook(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn help_output() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Quiz authoring and grading for a digital classroom",
        ));
}

#[test]
fn version_output() {
    let dir = TempDir::new().unwrap();
    gradebook(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gradebook"));
}
