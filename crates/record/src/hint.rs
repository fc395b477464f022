use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::data::RECORD_ALIGN;
use crate::{codec, RecordError};

/// Filename suffix of data files.
pub const DATA_SUFFIX: &str = "data";
/// Filename suffix of hint files, replacing [`DATA_SUFFIX`].
pub const HINT_SUFFIX: &str = "hint.qlz";

/// Largest key size a hint record can express (the size field is 8 bits).
const MAX_HINT_KEY: usize = 255;

/// Fixed bytes per entry besides the key: packed u32, ver, hash, NUL.
const ENTRY_OVERHEAD: usize = 4 + 4 + 2 + 1;

/// One entry of a hint file: where a key's record lives in the sibling
/// data file.
///
/// On disk the entry opens with a single u32 whose low 8 bits are the key
/// size and whose upper 24 bits are `datapos >> 8` — the 256-byte record
/// alignment guarantees the low 8 bits of a real offset are zero, so the
/// packing is lossless.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintRecord {
    /// The record's key.
    pub key: Vec<u8>,
    /// Byte offset of the record header in the data file.
    pub datapos: u32,
    /// Record version (negative for tombstones).
    pub ver: i32,
    /// Low 16 bits of the value's content fingerprint.
    pub hash: u16,
}

impl HintRecord {
    /// Serializes this entry onto `out`.
    ///
    /// # Errors
    ///
    /// [`RecordError::KeyTooLong`] when the key exceeds 255 bytes, and
    /// [`RecordError::Corrupt`] when `datapos` is not 256-aligned (such an
    /// offset cannot be packed).
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<(), RecordError> {
        if self.key.len() > MAX_HINT_KEY {
            return Err(RecordError::KeyTooLong(self.key.len()));
        }
        if u64::from(self.datapos) % RECORD_ALIGN != 0 {
            return Err(RecordError::Corrupt {
                pos: u64::from(self.datapos),
                reason: "datapos is not 256-aligned".to_string(),
            });
        }
        out.write_u32::<LittleEndian>(self.datapos | self.key.len() as u32)?;
        out.write_i32::<LittleEndian>(self.ver)?;
        out.write_u16::<LittleEndian>(self.hash)?;
        out.extend_from_slice(&self.key);
        out.push(0);
        Ok(())
    }

    /// Decodes the entry starting at `buf[*offset]`, advancing `offset`
    /// past it. Returns `Ok(None)` when the buffer is exhausted.
    pub fn decode(buf: &[u8], offset: &mut usize) -> Result<Option<Self>, RecordError> {
        if *offset == buf.len() {
            return Ok(None);
        }
        let start = *offset;
        let rest = &buf[start..];
        if rest.len() < ENTRY_OVERHEAD {
            return Err(RecordError::Corrupt {
                pos: start as u64,
                reason: "truncated hint entry".to_string(),
            });
        }

        let mut r = rest;
        let packed = r.read_u32::<LittleEndian>()?;
        let ver = r.read_i32::<LittleEndian>()?;
        let hash = r.read_u16::<LittleEndian>()?;

        let ksz = (packed & 0xff) as usize;
        let datapos = packed & 0xffff_ff00;

        if rest.len() < ENTRY_OVERHEAD + ksz {
            return Err(RecordError::Corrupt {
                pos: start as u64,
                reason: "hint entry key runs past the buffer".to_string(),
            });
        }
        let key = rest[10..10 + ksz].to_vec();

        *offset = start + ENTRY_OVERHEAD + ksz;
        Ok(Some(Self {
            key,
            datapos,
            ver,
            hash,
        }))
    }
}

/// Derives the hint path for a data file: `…X.data` becomes
/// `…X.hint.qlz`.
///
/// # Panics
///
/// Panics when `data_path` does not end in `.data`; callers list data
/// files by that suffix before ever deriving a hint path.
#[must_use]
pub fn hint_path(data_path: &Path) -> PathBuf {
    let name = data_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let prefix = name
        .strip_suffix(DATA_SUFFIX)
        .unwrap_or_else(|| panic!("not a data file: {}", data_path.display()));
    data_path.with_file_name(format!("{}{}", prefix, HINT_SUFFIX))
}

/// The scratch copy a hint is compared against by offline validation.
#[must_use]
pub fn tmp_hint_path(data_path: &Path) -> PathBuf {
    let hint = hint_path(data_path);
    let name = hint
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    hint.with_file_name(format!("{}.tmp", name))
}

/// Writes a complete hint file: the entries are concatenated, compressed
/// as one blob, written to a temp sibling, fsynced, and renamed into
/// place.
pub fn write_hint_file(path: &Path, records: &[HintRecord]) -> Result<(), RecordError> {
    let mut raw = Vec::with_capacity(records.iter().map(|r| ENTRY_OVERHEAD + r.key.len()).sum());
    for rec in records {
        rec.encode(&mut raw)?;
    }
    let compressed = codec::compress(&raw)?;

    let tmp = path.with_extension("qlz.write");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(&compressed)?;
        f.flush()?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads and decodes a complete hint file.
pub fn read_hint_file(path: &Path) -> Result<Vec<HintRecord>, RecordError> {
    let compressed = fs::read(path)?;
    let raw = codec::decompress(&compressed)?;

    let mut records = Vec::new();
    let mut offset = 0usize;
    while let Some(rec) = HintRecord::decode(&raw, &mut offset)? {
        records.push(rec);
    }
    Ok(records)
}
