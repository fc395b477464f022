use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher as Crc32;
use fnvhash::content_hash;
use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::Path;
use tracing::warn;

use crate::{codec, RecordError};

/// Record starts are aligned to this boundary; padding after each record
/// fills up to the next multiple.
pub const RECORD_ALIGN: u64 = 256;

/// Fixed header size preceding key and value bytes.
pub const HEADER_SIZE: usize = 24;

/// Flag bit marking a value that is stored compressed.
pub const FLAG_COMPRESSED: i32 = 0x0001_0000;

/// Maximum key size we'll allocate during reads (64 KiB). Prevents OOM on
/// corrupt files.
const MAX_KEY_BYTES: usize = 64 * 1024;
/// Maximum value size we'll allocate during reads (64 MiB). Prevents OOM on
/// corrupt files.
const MAX_VALUE_BYTES: usize = 64 * 1024 * 1024;

/// One key/value entry as stored in a data file.
///
/// `value` holds the *stored* bytes: if [`Record::is_compressed`] they are
/// the compressed form, and rewrites copy them through unchanged. Use
/// [`Record::plain_value`] to obtain the logical value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Non-zero for every valid record; zero marks end-of-data on disk.
    pub crc: u32,
    /// Write time, Unix seconds.
    pub tstamp: i32,
    /// Bitfield; see [`FLAG_COMPRESSED`].
    pub flag: i32,
    /// Version; negative marks a tombstone.
    pub ver: i32,
    /// The lookup key.
    pub key: Vec<u8>,
    /// The stored value bytes.
    pub value: Vec<u8>,
}

impl Record {
    /// Builds a record with a freshly computed checksum.
    ///
    /// The checksum covers everything after the crc field: the remaining
    /// header, the key, and the stored value bytes.
    pub fn new(key: Vec<u8>, value: Vec<u8>, ver: i32, tstamp: i32, flag: i32) -> Self {
        let mut hasher = Crc32::new();
        hasher.update(&tstamp.to_le_bytes());
        hasher.update(&flag.to_le_bytes());
        hasher.update(&ver.to_le_bytes());
        hasher.update(&(key.len() as u32).to_le_bytes());
        hasher.update(&(value.len() as u32).to_le_bytes());
        hasher.update(&key);
        hasher.update(&value);
        let mut crc = hasher.finalize();
        if crc == 0 {
            // Zero is reserved as the end-of-data marker.
            crc = 1;
        }
        Self {
            crc,
            tstamp,
            flag,
            ver,
            key,
            value,
        }
    }

    /// `true` when this record marks a deletion.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.ver < 0
    }

    /// `true` when the stored value bytes are compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.flag & FLAG_COMPRESSED != 0
    }

    /// Header + key + value size, excluding padding.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        HEADER_SIZE as u64 + self.key.len() as u64 + self.value.len() as u64
    }

    /// The logical value: decompressed when stored compressed, borrowed
    /// otherwise.
    pub fn plain_value(&self) -> Result<Cow<'_, [u8]>, RecordError> {
        if self.is_compressed() {
            Ok(Cow::Owned(codec::decompress(&self.value)?))
        } else {
            Ok(Cow::Borrowed(&self.value))
        }
    }
}

/// Padding bytes needed after a record of `total_size` bytes to reach the
/// next alignment boundary.
#[must_use]
pub fn padding_for(total_size: u64) -> u64 {
    (RECORD_ALIGN - total_size % RECORD_ALIGN) % RECORD_ALIGN
}

/// A record together with where it was read from and its value fingerprint.
#[derive(Debug, Clone)]
pub struct ParsedRecord {
    /// Byte offset of the record header; always a multiple of 256.
    pub datapos: u32,
    /// The record itself, value bytes as stored.
    pub record: Record,
    /// Full 32-bit content fingerprint of the *logical* value.
    pub hash: u32,
}

/// Sequential reader over one data file.
///
/// Yields records in file order. Scanning stops at the first invalid
/// record (zero crc), which is logged and treated as end-of-data: the rest
/// of the file is assumed to be trailing zeros from a crash. A cleanly
/// truncated tail is also treated as end-of-data.
pub struct DataFileReader {
    rdr: BufReader<File>,
    pos: u64,
}

impl DataFileReader {
    /// Opens a data file for sequential scanning.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let f = File::open(path)?;
        Ok(Self {
            rdr: BufReader::new(f),
            pos: 0,
        })
    }

    /// Current read position (the datapos of the next record).
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Reads the next record, or `Ok(None)` at end-of-data.
    ///
    /// # Errors
    ///
    /// I/O errors propagate. Structurally impossible field values
    /// (oversized lengths, offsets past the 32-bit range) are reported as
    /// [`RecordError::Corrupt`].
    pub fn next_record(&mut self) -> Result<Option<ParsedRecord>, RecordError> {
        let datapos = self.pos;

        let mut header = [0u8; HEADER_SIZE];
        match self.rdr.read_exact(&mut header) {
            Ok(()) => {}
            // A partial header at the tail reads as end-of-data, same as a
            // clean EOF at a record boundary.
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(RecordError::Io(e)),
        }

        let mut h = &header[..];
        let crc = h.read_u32::<LittleEndian>()?;
        let tstamp = h.read_i32::<LittleEndian>()?;
        let flag = h.read_i32::<LittleEndian>()?;
        let ver = h.read_i32::<LittleEndian>()?;
        let ksz = h.read_u32::<LittleEndian>()? as usize;
        let vsz = h.read_u32::<LittleEndian>()? as usize;

        if crc == 0 {
            warn!(pos = datapos, "invalid record, stopping scan");
            // Step over what would have been this slot's padding so a
            // caller inspecting the position still sees an aligned offset.
            let pad = padding_for(HEADER_SIZE as u64) as i64;
            self.rdr.seek_relative(pad)?;
            self.pos = datapos + HEADER_SIZE as u64 + pad as u64;
            return Ok(None);
        }

        if ksz > MAX_KEY_BYTES {
            return Err(RecordError::Corrupt {
                pos: datapos,
                reason: format!("key size {} exceeds maximum {}", ksz, MAX_KEY_BYTES),
            });
        }
        if vsz > MAX_VALUE_BYTES {
            return Err(RecordError::Corrupt {
                pos: datapos,
                reason: format!("value size {} exceeds maximum {}", vsz, MAX_VALUE_BYTES),
            });
        }
        if datapos > u64::from(u32::MAX) {
            return Err(RecordError::Corrupt {
                pos: datapos,
                reason: "record offset exceeds the 32-bit range".to_string(),
            });
        }

        let mut key = vec![0u8; ksz];
        self.rdr.read_exact(&mut key)?;
        let mut value = vec![0u8; vsz];
        self.rdr.read_exact(&mut value)?;

        let record = Record {
            crc,
            tstamp,
            flag,
            ver,
            key,
            value,
        };
        let hash = content_hash(&record.plain_value()?);

        let total = record.total_size();
        let pad = padding_for(total);
        self.rdr.seek_relative(pad as i64)?;
        self.pos = datapos + total + pad;

        Ok(Some(ParsedRecord {
            datapos: datapos as u32,
            record,
            hash,
        }))
    }
}

/// Append-only writer producing an aligned data file.
///
/// Never re-encodes a payload: the record's header, key, and value bytes
/// are written exactly as given, followed by NUL padding to the next
/// 256-byte boundary. Each append is serialized into a reusable scratch
/// buffer and written with a single `write_all` call.
pub struct DataFileWriter {
    file: File,
    pos: u64,
    /// Reusable scratch buffer to avoid allocation on every append.
    buf: Vec<u8>,
}

impl DataFileWriter {
    /// Creates (or truncates) a data file for writing.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file,
            pos: 0,
            buf: Vec::with_capacity(RECORD_ALIGN as usize),
        })
    }

    /// Appends `record` and returns its datapos.
    pub fn append(&mut self, record: &Record) -> Result<u32, RecordError> {
        debug_assert_eq!(self.pos % RECORD_ALIGN, 0);
        let datapos = self.pos;
        if datapos > u64::from(u32::MAX) {
            return Err(RecordError::Corrupt {
                pos: datapos,
                reason: "data file grew past the 32-bit offset range".to_string(),
            });
        }

        self.buf.clear();
        self.buf.write_u32::<LittleEndian>(record.crc)?;
        self.buf.write_i32::<LittleEndian>(record.tstamp)?;
        self.buf.write_i32::<LittleEndian>(record.flag)?;
        self.buf.write_i32::<LittleEndian>(record.ver)?;
        self.buf
            .write_u32::<LittleEndian>(record.key.len() as u32)?;
        self.buf
            .write_u32::<LittleEndian>(record.value.len() as u32)?;
        self.buf.extend_from_slice(&record.key);
        self.buf.extend_from_slice(&record.value);

        let pad = padding_for(record.total_size()) as usize;
        self.buf.resize(self.buf.len() + pad, 0);

        self.file.write_all(&self.buf)?;
        self.pos += self.buf.len() as u64;

        Ok(datapos as u32)
    }

    /// Bytes written so far; always a multiple of 256.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Flushes and fsyncs the file.
    pub fn sync(&mut self) -> Result<(), RecordError> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
