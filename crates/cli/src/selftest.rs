//! Built-in end-to-end self-test (`podctl --test`).
//!
//! Exercises the full offline pipeline in a scratch directory: write data
//! files, build and validate hints, compact, and validate again. Prints
//! one line per check and exits nonzero if any fails.

use anyhow::{Context, Result};
use compactor::{compact_dir, live_keys, unix_now, verify_hints};
use record::{hint_path, read_hint_file, DataFileWriter, Record};
use std::path::PathBuf;

struct Check {
    name: &'static str,
    passed: bool,
}

pub fn run() -> Result<i32> {
    let dir = scratch_dir()?;
    let mut checks: Vec<Check> = Vec::new();
    let mut check = |name: &'static str, passed: bool| {
        println!("{} {}", if passed { "ok  " } else { "FAIL" }, name);
        checks.push(Check { name, passed });
    };

    // Two files: a duplicate key, a tombstoned key, and a survivor.
    let f0 = dir.join("000.data");
    let mut w = DataFileWriter::create(&f0)?;
    w.append(&Record::new(b"dup".to_vec(), b"old".to_vec(), 1, 0, 0))?;
    w.append(&Record::new(b"gone".to_vec(), b"x".to_vec(), 1, 0, 0))?;
    w.append(&Record::new(b"keep".to_vec(), b"alive".to_vec(), 1, 0, 0))?;
    w.sync()?;

    let f1 = dir.join("001.data");
    let mut w = DataFileWriter::create(&f1)?;
    w.append(&Record::new(b"dup".to_vec(), b"new".to_vec(), 2, 0, 0))?;
    w.append(&Record::new(b"gone".to_vec(), Vec::new(), -2, 0, 0))?;
    w.sync()?;

    let (built, failed) = compactor::build_hints(&dir)?;
    check("hints built for every data file", built == 2 && failed == 0);
    check(
        "fresh hints validate against a rescan",
        verify_hints(&dir)?.is_empty(),
    );

    let stats = compact_dir(&dir, None, unix_now())?;
    check("both files needed rewriting", stats.files_rewritten == 2);
    check(
        "duplicate, tombstoned, and shadowed records dropped",
        stats.deleted == 3,
    );
    check("no spurious errors", stats.errors == 0);

    let keys = live_keys(&dir)?;
    check(
        "live keys after compaction are dup and keep",
        keys.iter().map(|(k, _, _)| k.as_slice()).collect::<Vec<_>>() == vec![&b"dup"[..], &b"keep"[..]],
    );
    check(
        "compacted hints validate against a rescan",
        verify_hints(&dir)?.is_empty(),
    );
    check(
        "rewritten hint carries the surviving version",
        read_hint_file(&hint_path(&f1))?.iter().any(|h| h.key == b"dup" && h.ver == 2),
    );

    let failures: Vec<&str> = checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| c.name)
        .collect();
    println!(
        "self-test: {}/{} checks passed",
        checks.len() - failures.len(),
        checks.len()
    );
    if !failures.is_empty() {
        println!("failed: {}", failures.join(", "));
    }

    let _ = std::fs::remove_dir_all(&dir);
    Ok(if failures.is_empty() { 0 } else { 1 })
}

/// A unique scratch directory under the system temp dir.
fn scratch_dir() -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("podctl-selftest-{}", std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir).context("cannot clear old scratch dir")?;
    }
    std::fs::create_dir_all(&dir).context("cannot create scratch dir")?;
    Ok(dir)
}
