use record::{DataFileWriter, Record};
use std::path::Path;

use crate::index::{FileIndex, IndexEntry};

/// A fixed "now" so expiry arithmetic is reproducible.
pub(crate) const NOW: i64 = 1_700_000_000;

pub(crate) const DAY: i64 = 86_400;

/// Writes a data file from `(key, value, ver, tstamp)` tuples, returning
/// each record's datapos.
pub(crate) fn write_data_file(
    path: &Path,
    records: &[(&[u8], &[u8], i32, i32)],
) -> Vec<u32> {
    let mut w = DataFileWriter::create(path).unwrap();
    let mut positions = Vec::new();
    for &(key, value, ver, tstamp) in records {
        let rec = Record::new(key.to_vec(), value.to_vec(), ver, tstamp, 0);
        positions.push(w.append(&rec).unwrap());
    }
    w.sync().unwrap();
    positions
}

/// An in-memory index entry as a scan would produce it.
pub(crate) fn entry(key: &[u8], datapos: u32, ver: i32, tstamp: i32, vsz: u32) -> IndexEntry {
    IndexEntry {
        key: key.to_vec(),
        datapos,
        ver,
        ksz: key.len() as u32,
        hash: 0,
        vsz: Some(vsz),
        tstamp: Some(tstamp),
    }
}

/// A file index fixture; the path only matters for diagnostics.
pub(crate) fn file_index(name: &str, entries: Vec<IndexEntry>) -> FileIndex {
    FileIndex {
        path: name.into(),
        entries,
    }
}
