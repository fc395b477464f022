//! Integration tests driving the podctl binary end to end: generated
//! data files in a temp directory, real process spawns, asserted stdout
//! and exit codes.

use record::{DataFileWriter, Record};
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

/// Runs podctl with the given arguments and captures the full output.
fn run_podctl(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "-p", "cli", "--quiet", "--"])
        .args(args)
        .output()
        .expect("failed to spawn podctl")
}

fn stdout_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn write_file(path: &Path, records: &[(&[u8], &[u8], i32)]) {
    let mut w = DataFileWriter::create(path).unwrap();
    for &(key, value, ver) in records {
        w.append(&Record::new(key.to_vec(), value.to_vec(), ver, 0, 0))
            .unwrap();
    }
    w.sync().unwrap();
}

#[test]
fn missing_directory_exits_nonzero() {
    let output = run_podctl(&["-d", "/definitely/not/here", "-p"]);
    assert!(!output.status.success());
}

#[test]
fn malformed_expiry_spec_aborts_before_touching_files() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000.data");
    write_file(&path, &[(b"k", b"v1", 1), (b"k", b"v2", 2)]);
    let bytes = std::fs::read(&path).unwrap();

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-m", "-r", "10X:30"]);
    assert!(!output.status.success());

    // The compaction never ran.
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
}

#[test]
fn print_lists_live_keys_with_ver_and_datapos() {
    let dir = tempdir().unwrap();
    write_file(
        &dir.path().join("000.data"),
        &[(b"alpha", b"1", 3), (b"beta", b"2", 5)],
    );

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-p"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("alpha\t3\t0"));
    assert!(stdout.contains("beta\t5\t256"));
}

#[test]
fn build_then_check_is_clean() {
    let dir = tempdir().unwrap();
    write_file(
        &dir.path().join("000.data"),
        &[(b"a", b"1", 1), (b"b", b"2", 1)],
    );

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-b"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("built 1 hint file(s)"));
    assert!(dir.path().join("000.hint.qlz").exists());

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-c"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("0 hint diff(s)"));
}

#[test]
fn check_flags_stale_hints_and_exits_nonzero() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000.data");
    write_file(&path, &[(b"a", b"1", 1)]);

    assert!(run_podctl(&["-d", dir.path().to_str().unwrap(), "-b"])
        .status
        .success());

    // Grow the data file behind the hint's back.
    write_file(&path, &[(b"a", b"1", 1), (b"late", b"2", 1)]);

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-c"]);
    assert!(!output.status.success());
    assert!(stdout_of(&output).contains("late"));
}

#[test]
fn compact_drops_superseded_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000.data");
    write_file(&path, &[(b"k1", b"v1", 1), (b"k1", b"v2", 2)]);

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-m"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("1 deleted"));

    // Only the newer record remains, and the hint sidecar was refreshed.
    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-p"]);
    let stdout = stdout_of(&output);
    assert!(stdout.contains("k1\t2\t0"));
    assert!(!stdout.contains("k1\t1"));

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-c"]);
    assert!(output.status.success());
}

#[test]
fn compact_with_expiry_drops_old_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000.data");

    // tstamp = 1 is ancient; everything of any size expires after 1 day.
    let mut w = DataFileWriter::create(&path).unwrap();
    w.append(&Record::new(b"old".to_vec(), b"v".to_vec(), 1, 1, 0))
        .unwrap();
    w.sync().unwrap();

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-m", "-e", "1"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("1 expired"));

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-p"]);
    assert!(!stdout_of(&output).contains("old"));
}

#[test]
fn tombstone_compacts_away_with_its_value() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("000.data");
    write_file(&path, &[(b"k", b"v", 5), (b"k", b"", -1)]);

    let output = run_podctl(&["-d", dir.path().to_str().unwrap(), "-m"]);
    assert!(output.status.success());
    assert!(stdout_of(&output).contains("2 deleted"));
    assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn self_test_passes() {
    let output = run_podctl(&["--test"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("checks passed"));
    assert!(!stdout.contains("FAIL"));
}
