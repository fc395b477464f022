use anyhow::Result;
use record::{hint_path, tmp_hint_path};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::index::{load_hint_index, scan_data_file, FileIndex, IndexEntry};

/// One disagreement found while validating hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HintDiff {
    /// The key exists in the reference view but not in the hint under
    /// test.
    Missing {
        /// Data file the diff belongs to.
        path: PathBuf,
        /// The affected key.
        key: Vec<u8>,
    },
    /// The hint under test carries a key the reference view lacks.
    Unexpected {
        /// Data file the diff belongs to.
        path: PathBuf,
        /// The affected key.
        key: Vec<u8>,
    },
    /// A field disagrees between the two views.
    Field {
        /// Data file the diff belongs to.
        path: PathBuf,
        /// The affected key.
        key: Vec<u8>,
        /// Which field disagreed.
        field: &'static str,
        /// The reference view's value.
        expected: i64,
        /// The hint-under-test's value.
        actual: i64,
    },
}

impl fmt::Display for HintDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { path, key } => write!(
                f,
                "{}: key {} missing from hint",
                path.display(),
                String::from_utf8_lossy(key)
            ),
            Self::Unexpected { path, key } => write!(
                f,
                "{}: key {} only in hint",
                path.display(),
                String::from_utf8_lossy(key)
            ),
            Self::Field {
                path,
                key,
                field,
                expected,
                actual,
            } => write!(
                f,
                "{}: key {} {} mismatch: {} != {}",
                path.display(),
                String::from_utf8_lossy(key),
                field,
                expected,
                actual
            ),
        }
    }
}

/// Compares two last-wins views of the same data file on the given
/// fields.
fn diff_views(
    path: &Path,
    reference: &FileIndex,
    candidate: &FileIndex,
    fields: &[&'static str],
) -> Vec<HintDiff> {
    let reference = reference.live();
    let candidate = candidate.live();
    let mut diffs = Vec::new();

    let mut keys: Vec<&[u8]> = reference.keys().copied().collect();
    keys.sort_unstable();
    for key in keys {
        let left = reference[key];
        match candidate.get(key) {
            None => diffs.push(HintDiff::Missing {
                path: path.to_path_buf(),
                key: key.to_vec(),
            }),
            Some(right) => diff_fields(path, left, right, fields, &mut diffs),
        }
    }

    let mut extra: Vec<&[u8]> = candidate
        .keys()
        .copied()
        .filter(|k| !reference.contains_key(k))
        .collect();
    extra.sort_unstable();
    for key in extra {
        diffs.push(HintDiff::Unexpected {
            path: path.to_path_buf(),
            key: key.to_vec(),
        });
    }

    diffs
}

fn diff_fields(
    path: &Path,
    left: &IndexEntry,
    right: &IndexEntry,
    fields: &[&'static str],
    diffs: &mut Vec<HintDiff>,
) {
    let mut values: HashMap<&'static str, (i64, i64)> = HashMap::new();
    values.insert("datapos", (i64::from(left.datapos), i64::from(right.datapos)));
    values.insert("ver", (i64::from(left.ver), i64::from(right.ver)));
    values.insert("hash", (i64::from(left.hash), i64::from(right.hash)));
    values.insert("ksz", (i64::from(left.ksz), i64::from(right.ksz)));

    for &field in fields {
        let (expected, actual) = values[field];
        if expected != actual {
            diffs.push(HintDiff::Field {
                path: path.to_path_buf(),
                key: left.key.clone(),
                field,
                expected,
                actual,
            });
        }
    }
}

/// Validates every hinted data file by rescanning it and diffing the
/// hint on `datapos` and `ver`. Files without a hint are skipped with a
/// warning.
pub fn verify_hints(dir: &Path) -> Result<Vec<HintDiff>> {
    let mut diffs = Vec::new();
    for path in crate::index::data_files(dir)? {
        if !hint_path(&path).exists() {
            warn!(file = %path.display(), "no hint to validate");
            continue;
        }
        let scanned = scan_data_file(&path)?;
        let hinted = load_hint_index(&path)?;
        diffs.extend(diff_views(&path, &scanned, &hinted, &["datapos", "ver"]));
    }
    Ok(diffs)
}

/// Validates every hint against its `.tmp` scratch copy on `datapos`,
/// `ver`, `hash`, and `ksz`. Files lacking either side are skipped with
/// a warning.
pub fn verify_tmp_hints(dir: &Path) -> Result<Vec<HintDiff>> {
    let mut diffs = Vec::new();
    for path in crate::index::data_files(dir)? {
        if !hint_path(&path).exists() || !tmp_hint_path(&path).exists() {
            warn!(file = %path.display(), "hint or tmp hint absent, skipping");
            continue;
        }
        let hinted = load_hint_index(&path)?;
        let tmp = load_tmp_hint_index(&path)?;
        diffs.extend(diff_views(
            &path,
            &hinted,
            &tmp,
            &["datapos", "ver", "hash", "ksz"],
        ));
    }
    Ok(diffs)
}

/// Loads the `.tmp` hint sibling as a file index.
fn load_tmp_hint_index(path: &Path) -> Result<FileIndex> {
    use anyhow::Context;
    let tmp = tmp_hint_path(path);
    let records = record::read_hint_file(&tmp)
        .with_context(|| format!("cannot decode tmp hint {}", tmp.display()))?;
    Ok(FileIndex {
        path: path.to_path_buf(),
        entries: records
            .into_iter()
            .map(|rec| IndexEntry {
                ksz: rec.key.len() as u32,
                datapos: rec.datapos,
                ver: rec.ver,
                hash: rec.hash,
                vsz: None,
                tstamp: None,
                key: rec.key,
            })
            .collect(),
    })
}
