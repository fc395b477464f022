use anyhow::{Context, Result};
use fnvhash::HINT_HASH_MASK;
use record::{hint_path, read_hint_file, DataFileReader, HintRecord};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One record occurrence as seen by the planner and validators.
///
/// `tstamp` and `vsz` are known only when the entry came from a data-file
/// scan; hint files don't carry them, which is why an active expiry policy
/// forces a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// The record's key.
    pub key: Vec<u8>,
    /// Byte offset of the record header in its data file.
    pub datapos: u32,
    /// Record version; negative marks a tombstone.
    pub ver: i32,
    /// Key length in bytes.
    pub ksz: u32,
    /// Low 16 bits of the value's content fingerprint.
    pub hash: u16,
    /// Stored value length; `None` when loaded from a hint.
    pub vsz: Option<u32>,
    /// Write time; `None` when loaded from a hint.
    pub tstamp: Option<i32>,
}

/// The index of one data file: every record occurrence, in file order.
#[derive(Debug, Clone)]
pub struct FileIndex {
    /// The data file this index describes.
    pub path: PathBuf,
    /// Occurrences in ascending datapos order (hint-loaded indexes keep
    /// the hint's stored order, which was built the same way).
    pub entries: Vec<IndexEntry>,
}

impl FileIndex {
    /// Last-wins view: each key mapped to its latest occurrence in this
    /// file.
    #[must_use]
    pub fn live(&self) -> HashMap<&[u8], &IndexEntry> {
        let mut map = HashMap::with_capacity(self.entries.len());
        for entry in &self.entries {
            map.insert(entry.key.as_slice(), entry);
        }
        map
    }
}

/// Lists the `*.data` files of `dir`, sorted lexicographically by file
/// name — which matches creation order under the storage daemon's naming
/// convention.
pub fn data_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("unreadable data directory {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|x| x == "data").unwrap_or(false))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Builds a file's index by scanning its records.
pub fn scan_data_file(path: &Path) -> Result<FileIndex> {
    let mut reader = DataFileReader::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;

    let mut entries = Vec::new();
    while let Some(parsed) = reader
        .next_record()
        .with_context(|| format!("scan failed in {}", path.display()))?
    {
        entries.push(IndexEntry {
            datapos: parsed.datapos,
            ver: parsed.record.ver,
            ksz: parsed.record.key.len() as u32,
            hash: (parsed.hash & HINT_HASH_MASK) as u16,
            vsz: Some(parsed.record.value.len() as u32),
            tstamp: Some(parsed.record.tstamp),
            key: parsed.record.key,
        });
    }

    Ok(FileIndex {
        path: path.to_path_buf(),
        entries,
    })
}

/// Builds a file's index from its hint sidecar.
pub fn load_hint_index(path: &Path) -> Result<FileIndex> {
    let hint = hint_path(path);
    let records = read_hint_file(&hint)
        .with_context(|| format!("cannot decode hint {}", hint.display()))?;

    let entries = records
        .into_iter()
        .map(|rec: HintRecord| IndexEntry {
            ksz: rec.key.len() as u32,
            datapos: rec.datapos,
            ver: rec.ver,
            hash: rec.hash,
            vsz: None,
            tstamp: None,
            key: rec.key,
        })
        .collect();

    Ok(FileIndex {
        path: path.to_path_buf(),
        entries,
    })
}

/// Builds a file's index, preferring the hint sidecar when `allow_hint`
/// and one exists, falling back to a data scan.
pub fn build_index(path: &Path, allow_hint: bool) -> Result<FileIndex> {
    if allow_hint && hint_path(path).exists() {
        load_hint_index(path)
    } else {
        scan_data_file(path)
    }
}

/// The directory's live keys: per-file indexes merged in ascending file
/// order, later files overriding earlier ones. Returns
/// `(key, ver, datapos)` tuples sorted by key.
pub fn live_keys(dir: &Path) -> Result<Vec<(Vec<u8>, i32, u32)>> {
    let mut merged: HashMap<Vec<u8>, (i32, u32)> = HashMap::new();
    for path in data_files(dir)? {
        let index = build_index(&path, true)?;
        for entry in index.entries {
            merged.insert(entry.key, (entry.ver, entry.datapos));
        }
    }

    let mut keys: Vec<(Vec<u8>, i32, u32)> = merged
        .into_iter()
        .map(|(key, (ver, datapos))| (key, ver, datapos))
        .collect();
    keys.sort();
    Ok(keys)
}
