//! Binary-level tests for the dict-builder CLI
//!
//! None of these reach the network: every word is either already in the
//! progress file or the command never fetches.

use assert_cmd::Command;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use dict_builder::orchestrator::{FailureReason, Outcome};
use dict_builder::resume::{ProgressState, ProgressStore};
use dict_builder::word::Key;

fn dict_builder() -> Command {
    let mut cmd = Command::cargo_bin("dict-builder").unwrap();
    cmd.env_remove("DICT_BUILDER_OUTPUT_FORMAT")
        .env_remove("DICT_BUILDER_PROGRESS_FILE")
        .env_remove("DICT_BUILDER_WORDS");
    cmd
}

/// Progress file with `casa` and `agua` translated and `xyz123` problematic
fn seed_progress(path: &Path) {
    let mut state = ProgressState::new();
    state.record(&Key::new("casa"), Outcome::text("집"));
    state.record(&Key::new("agua"), Outcome::text("물"));
    state.record(&Key::new("xyz123"), Outcome::Failure(FailureReason::NoData));
    state.mark_checkpoint();
    ProgressStore::new(path).save(&state).unwrap();
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_missing_word_list_fails() {
    let dir = TempDir::new().unwrap();

    dict_builder()
        .current_dir(dir.path())
        .args(["build", "--words", "missing.txt"])
        .assert()
        .failure();
}

#[test]
fn test_status_without_progress_file() {
    let dir = TempDir::new().unwrap();
    let progress = dir.path().join("progress.json");

    let output = dict_builder()
        .args(["status", "--output-format", "json", "--progress-file"])
        .arg(&progress)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["processed"], 0);
    assert_eq!(json["pending"], serde_json::Value::Null);
}

#[test]
fn test_status_counts_pending_against_word_list() {
    let dir = TempDir::new().unwrap();
    let progress = dir.path().join("progress.json");
    let words = dir.path().join("words.txt");
    seed_progress(&progress);
    fs::write(&words, "casa|n\nxyz123\nperro|n\n").unwrap();

    let output = dict_builder()
        .args(["status", "--output-format", "json", "--progress-file"])
        .arg(&progress)
        .arg("--words")
        .arg(&words)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["succeeded"], 2);
    assert_eq!(json["problematic"], 1);
    assert_eq!(json["pending"], 2);
    assert_eq!(json["checkpoints"], 1);
}

#[test]
fn test_export_writes_dictionary_and_report() {
    let dir = TempDir::new().unwrap();
    let progress = dir.path().join("progress.json");
    let words = dir.path().join("words.txt");
    let output_path = dir.path().join("dictionary.csv");
    let report = dir.path().join("problematic.txt");
    seed_progress(&progress);
    fs::write(&words, "# list\ncasa|n\nxyz123\nagua|n\n").unwrap();

    dict_builder()
        .args(["export", "--format", "csv", "--progress-file"])
        .arg(&progress)
        .arg("--words")
        .arg(&words)
        .arg("--output")
        .arg(&output_path)
        .arg("--report")
        .arg(&report)
        .assert()
        .success();

    let mut reader = csv::Reader::from_path(&output_path).unwrap();
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[0][0], "casa");
    assert_eq!(&rows[0][1], "집");
    assert_eq!(&rows[1][0], "agua");

    assert_eq!(fs::read_to_string(&report).unwrap().trim(), "xyz123");
}

#[test]
fn test_build_with_nothing_pending_writes_artifacts() {
    let dir = TempDir::new().unwrap();
    let progress = dir.path().join("progress.json");
    let words = dir.path().join("words.txt");
    let output_path = dir.path().join("dictionary.json");
    let report = dir.path().join("problematic.txt");
    seed_progress(&progress);
    fs::write(&words, "casa|n\nagua|n\n").unwrap();

    let output = dict_builder()
        .args(["build", "--output-format", "json", "--skip-problematic", "--progress-file"])
        .arg(&progress)
        .arg("--words")
        .arg(&words)
        .arg("--output")
        .arg(&output_path)
        .arg("--report")
        .arg(&report)
        .output()
        .unwrap();

    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["stop_reason"], "completed");
    assert_eq!(json["processed"], 0);
    assert_eq!(json["entries_written"], 2);

    let rows: Vec<serde_json::Value> =
        serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], "casa");
    assert!(report.exists());
}

#[test]
fn test_resume_verify() {
    let dir = TempDir::new().unwrap();
    let progress = dir.path().join("progress.json");
    seed_progress(&progress);

    let output = dict_builder()
        .args(["build", "--words", "unused.txt", "--resume", "verify", "--output-format", "json"])
        .arg("--progress-file")
        .arg(&progress)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["valid"], true);

    fs::write(&progress, "{ not json").unwrap();
    dict_builder()
        .args(["build", "--words", "unused.txt", "--resume", "verify"])
        .arg("--progress-file")
        .arg(&progress)
        .assert()
        .failure();

    // Verify never quarantines or rewrites the file
    assert_eq!(fs::read_to_string(&progress).unwrap(), "{ not json");
}

#[test]
fn test_status_leaves_corrupt_file_in_place() {
    let dir = TempDir::new().unwrap();
    let progress = dir.path().join("progress.json");
    fs::write(&progress, "{ not json").unwrap();

    dict_builder()
        .arg("status")
        .arg("--progress-file")
        .arg(&progress)
        .assert()
        .failure();

    assert_eq!(fs::read_to_string(&progress).unwrap(), "{ not json");
    let quarantined: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(".corrupt-"))
        .collect();
    assert!(quarantined.is_empty(), "status moved the file: {quarantined:?}");
}
