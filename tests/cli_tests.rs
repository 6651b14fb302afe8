//! CLI integration tests using assert_cmd. None of these reach a database:
//! request validation runs before a connection is opened.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const STUDENT: &str = "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2";

fn academic_progress(dir: &TempDir) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("academic-progress").unwrap();
    cmd.current_dir(dir.path()).env_remove("DATABASE_URL");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    academic_progress(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("progression"))
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("import"));
}

#[test]
fn malformed_student_id_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    academic_progress(&dir)
        .args(["progression", "--student", "not-a-uuid"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not a valid UUID"));
}

#[test]
fn year_without_term_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    academic_progress(&dir)
        .args(["report", "--student", STUDENT, "--year", "2025"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("term number is required"));
}

#[test]
fn term_number_outside_range_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    academic_progress(&dir)
        .args(["semester", "--student", STUDENT, "--year", "2025", "--term", "3"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("term number must be 1 or 2"));
}

#[test]
fn missing_database_url_is_reported() {
    let dir = TempDir::new().unwrap();
    academic_progress(&dir)
        .args(["grades", "--student", STUDENT])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL must be set"));
}

#[test]
fn missing_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    academic_progress(&dir)
        .args(["--config", "nope.toml", "progression", "--student", STUDENT])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn invalid_thresholds_in_config_are_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("academic-progress.toml"),
        "[progression]\nmin_pass_rate = 75.0\n",
    )
    .unwrap();
    academic_progress(&dir)
        .args(["progression", "--student", STUDENT])
        .assert()
        .failure()
        .stderr(predicate::str::contains("min_pass_rate must be between 0 and 1"));
}
