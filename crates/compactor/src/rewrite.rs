use anyhow::{Context, Result};
use fnvhash::HINT_HASH_MASK;
use record::{hint_path, write_hint_file, DataFileReader, DataFileWriter, HintRecord};
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::expiry::ExpiryPolicy;
use crate::index::{build_index, data_files, FileIndex};
use crate::planner::{plan, CompactionPlan, DropReason};

/// Outcome of rewriting one data file.
#[derive(Debug, Default, Clone, Copy)]
pub struct RewriteStats {
    /// Records copied through.
    pub kept: usize,
    /// Records dropped as superseded or tombstoned.
    pub deleted: usize,
    /// Records dropped by the expiry policy.
    pub expired: usize,
}

/// Outcome of a whole-directory compaction run.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirStats {
    /// Files actually rewritten.
    pub files_rewritten: usize,
    /// Sum of per-file kept counters.
    pub kept: usize,
    /// Sum of per-file deleted counters.
    pub deleted: usize,
    /// Sum of per-file expired counters.
    pub expired: usize,
    /// Files skipped because their scan or rewrite failed.
    pub errors: usize,
}

/// Rewrites one data file, dropping the records `plan` marks for its
/// `tag`, and refreshes its hint.
///
/// Both outputs go to temp siblings first and are fsynced; the data file
/// is renamed into place before the hint so that a crash in between
/// leaves a stale hint, never a hint describing data that does not exist.
/// On error the originals are untouched and the temps linger for a retry.
pub fn compact_file(tag: usize, path: &Path, plan: &CompactionPlan) -> Result<RewriteStats> {
    let tmp_data = path.with_extension("data.tmp");
    let hint = hint_path(path);
    let tmp_hint = hint.with_extension("qlz.new");

    let mut reader = DataFileReader::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut writer = DataFileWriter::create(&tmp_data)
        .with_context(|| format!("cannot create {}", tmp_data.display()))?;

    let mut stats = RewriteStats::default();
    let mut hints: Vec<HintRecord> = Vec::new();

    while let Some(parsed) = reader
        .next_record()
        .with_context(|| format!("scan failed in {}", path.display()))?
    {
        match plan.drop_reason(tag, &parsed.record.key, parsed.record.ver) {
            Some(DropReason::Superseded) => stats.deleted += 1,
            Some(DropReason::Expired) => stats.expired += 1,
            None => {
                let datapos = writer.append(&parsed.record)?;
                hints.push(HintRecord {
                    key: parsed.record.key.clone(),
                    datapos,
                    ver: parsed.record.ver,
                    hash: (parsed.hash & HINT_HASH_MASK) as u16,
                });
                stats.kept += 1;
            }
        }
    }
    writer.sync()?;

    write_hint_file(&tmp_hint, &hints)
        .with_context(|| format!("cannot write {}", tmp_hint.display()))?;

    // Data first, hint second.
    fs::rename(&tmp_data, path)?;
    fs::rename(&tmp_hint, &hint)?;

    info!(
        file = %path.display(),
        kept = stats.kept,
        deleted = stats.deleted,
        expired = stats.expired,
        "compacted"
    );
    Ok(stats)
}

/// Compacts a data directory: index every file, plan the delete set, and
/// rewrite exactly the files containing dead records.
///
/// Hint sidecars may substitute for data scans only when no expiry
/// policy is active (hints carry no timestamps or sizes). A file whose
/// scan or rewrite fails is logged and skipped — it is never rewritten
/// from a bad index — and the run continues with the rest.
pub fn compact_dir(dir: &Path, policy: Option<&ExpiryPolicy>, now: i64) -> Result<DirStats> {
    let paths = data_files(dir)?;
    let allow_hint = policy.is_none();

    let mut indexes: Vec<FileIndex> = Vec::with_capacity(paths.len());
    let mut stats = DirStats::default();
    for path in &paths {
        match build_index(path, allow_hint) {
            Ok(index) => indexes.push(index),
            Err(e) => {
                error!(file = %path.display(), error = %e, "index failed, skipping file");
                stats.errors += 1;
            }
        }
    }

    let plan = plan(&indexes, policy, now);

    for &tag in &plan.files {
        match compact_file(tag, &indexes[tag].path, &plan) {
            Ok(file_stats) => {
                stats.files_rewritten += 1;
                stats.kept += file_stats.kept;
                stats.deleted += file_stats.deleted;
                stats.expired += file_stats.expired;
            }
            Err(e) => {
                error!(file = %indexes[tag].path.display(), error = %e, "rewrite failed");
                stats.errors += 1;
            }
        }
    }

    info!(
        files = stats.files_rewritten,
        deleted = stats.deleted,
        expired = stats.expired,
        errors = stats.errors,
        "compaction finished"
    );
    Ok(stats)
}

/// Builds (or replaces) the hint sidecar of every data file from a fresh
/// scan. Returns `(files built, files failed)`.
pub fn build_hints(dir: &Path) -> Result<(usize, usize)> {
    let mut built = 0usize;
    let mut failed = 0usize;

    for path in data_files(dir)? {
        match build_hint(&path) {
            Ok(entries) => {
                built += 1;
                info!(file = %path.display(), entries, "hint built");
            }
            Err(e) => {
                failed += 1;
                error!(file = %path.display(), error = %e, "hint build failed");
            }
        }
    }
    Ok((built, failed))
}

/// Builds one file's hint from a data scan, one entry per record
/// occurrence in file order.
pub fn build_hint(path: &Path) -> Result<usize> {
    let mut reader = DataFileReader::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let mut hints: Vec<HintRecord> = Vec::new();
    while let Some(parsed) = reader
        .next_record()
        .with_context(|| format!("scan failed in {}", path.display()))?
    {
        hints.push(HintRecord {
            key: parsed.record.key.clone(),
            datapos: parsed.datapos,
            ver: parsed.record.ver,
            hash: (parsed.hash & HINT_HASH_MASK) as u16,
        });
    }

    let hint = hint_path(path);
    write_hint_file(&hint, &hints)
        .with_context(|| format!("cannot write {}", hint.display()))?;
    Ok(hints.len())
}
