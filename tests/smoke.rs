//! Smoke tests driving the `tabulon` binary end to end: analyze -> review ->
//! normalize -> materialize -> status, over a couple of small fixture files.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

fn get_tabulon_bin() -> PathBuf {
    if let Ok(bin_path) = env::var("CARGO_BIN_EXE_tabulon") {
        return PathBuf::from(bin_path);
    }
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR should be set by cargo");
    let mut bin_path = PathBuf::from(manifest_dir);
    bin_path.push("target");
    bin_path.push("debug");
    bin_path.push("tabulon");
    if cfg!(windows) {
        bin_path.set_extension("exe");
    }
    bin_path
}

fn run_tabulon(args: &[&str], work_dir: &Path) -> std::process::Output {
    Command::new(get_tabulon_bin())
        .args(args)
        .current_dir(work_dir)
        .output()
        .expect("failed to execute tabulon")
}

fn write_fixture(dir: &Path) {
    fs::write(
        dir.join("people_a.csv"),
        "full_name,email,age\nAda Lovelace,ada@example.com,36\nGrace Hopper,grace@example.com,85\n",
    )
    .unwrap();
    fs::write(
        dir.join("people_b.csv"),
        "name,email,age\nAlan Turing,alan@example.com,41\n",
    )
    .unwrap();
}

/// Walks the full pipeline across two differently-headered CSV files and
/// checks that materialize produces a CSV per discovered schema.
#[test]
fn analyze_review_normalize_materialize_round_trip() {
    let temp = TempDir::new().expect("tempdir");
    let data_dir = temp.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    write_fixture(&data_dir);

    let store_path = temp.path().join("tabulon.db");
    let work_dir = temp.path();

    let analyze = run_tabulon(
        &[
            "analyze",
            data_dir.to_str().unwrap(),
            "--profile",
            "low_memory",
            "--store",
            store_path.to_str().unwrap(),
            "--job-id",
            "smoke-round-trip",
        ],
        work_dir,
    );
    assert!(
        analyze.status.success(),
        "analyze should succeed: {}",
        String::from_utf8_lossy(&analyze.stderr)
    );
    assert!(work_dir.join("mapping.json").exists(), "analyze should write mapping.json");

    let review = run_tabulon(
        &["review", "mapping.json", "--store", store_path.to_str().unwrap()],
        work_dir,
    );
    assert!(
        review.status.success(),
        "review should succeed: {}",
        String::from_utf8_lossy(&review.stderr)
    );
    assert!(work_dir.join("mapping.review.json").exists());
    assert!(work_dir.join("mapping.header_clusters.json").exists());

    let normalize = run_tabulon(
        &[
            "normalize",
            "mapping.review.json",
            "--header-clusters",
            "mapping.header_clusters.json",
        ],
        work_dir,
    );
    assert!(
        normalize.status.success(),
        "normalize should succeed: {}",
        String::from_utf8_lossy(&normalize.stderr)
    );
    assert!(work_dir.join("mapping.normalized.json").exists());

    let out_dir = temp.path().join("out");
    let checkpoint_dir = temp.path().join("checkpoints");
    let materialize = run_tabulon(
        &[
            "materialize",
            "mapping.normalized.json",
            out_dir.to_str().unwrap(),
            "--checkpoint-dir",
            checkpoint_dir.to_str().unwrap(),
            "--writer-format",
            "csv",
            "--store",
            store_path.to_str().unwrap(),
            "--job-id",
            "smoke-round-trip",
        ],
        work_dir,
    );
    assert!(
        materialize.status.success(),
        "materialize should succeed: {}",
        String::from_utf8_lossy(&materialize.stderr)
    );

    let written: Vec<_> = fs::read_dir(&out_dir)
        .expect("out dir should exist")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        written.iter().any(|name| name.ends_with(".csv")),
        "materialize should write at least one csv file, got {written:?}"
    );

    let status = run_tabulon(
        &["status", "smoke-round-trip", "--store", store_path.to_str().unwrap(), "--json"],
        work_dir,
    );
    assert!(status.status.success(), "status should succeed");
    let status_json: serde_json::Value = serde_json::from_slice(&status.stdout).expect("status --json should be valid JSON");
    assert_eq!(status_json["state"], "Done");
}

#[test]
fn analyze_on_empty_directory_fails_with_a_clear_error() {
    let temp = TempDir::new().expect("tempdir");
    let empty_dir = temp.path().join("empty");
    fs::create_dir_all(&empty_dir).unwrap();
    let store_path = temp.path().join("tabulon.db");

    let analyze = run_tabulon(
        &[
            "analyze",
            empty_dir.to_str().unwrap(),
            "--store",
            store_path.to_str().unwrap(),
        ],
        temp.path(),
    );
    assert!(!analyze.status.success(), "analyze over an empty directory should fail");
    let stderr = String::from_utf8_lossy(&analyze.stderr);
    assert!(stderr.contains("no .csv/.tsv/.txt files"), "stderr was: {stderr}");
}

#[test]
fn status_for_unknown_job_id_reports_an_error() {
    let temp = TempDir::new().expect("tempdir");
    let store_path = temp.path().join("tabulon.db");

    let status = run_tabulon(
        &["status", "does-not-exist", "--store", store_path.to_str().unwrap()],
        temp.path(),
    );
    assert!(!status.status.success());
}
