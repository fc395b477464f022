//! # record — PodKV on-disk codecs
//!
//! The binary formats shared by the storage daemon, the client tooling, and
//! the offline compactor. Two file kinds live side by side in a data
//! directory:
//!
//! ## Data files (`*.data`)
//!
//! An append-only sequence of records, each aligned to a 256-byte boundary:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ HEADER (24 bytes, little-endian)                        │
//! │                                                        │
//! │ crc (u32) | tstamp (i32) | flag (i32) | ver (i32)      │
//! │ ksz (u32) | vsz (u32)                                  │
//! ├────────────────────────────────────────────────────────┤
//! │ key (ksz bytes) | value (vsz bytes)                    │
//! ├────────────────────────────────────────────────────────┤
//! │ NUL padding to the next multiple of 256                 │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! `crc != 0` marks a valid record; a zero crc marks the end of the data
//! (trailing zeros left by a crash). `ver < 0` is a tombstone. The
//! `0x00010000` flag bit means the value bytes are stored compressed; the
//! stored bytes are never altered on rewrite — decompression happens only
//! to fingerprint the value.
//!
//! ## Hint files (`*.hint.qlz`)
//!
//! A compressed sidecar index over one data file. Each entry packs the key
//! size into the low 8 bits of a u32 whose upper 24 bits are
//! `datapos >> 8` (the alignment guarantees those low 8 bits of the real
//! offset are zero), followed by the version, the low 16 bits of the value
//! fingerprint, the key bytes, and one NUL. The whole file is one
//! compressed blob (see [`codec`]).
//!
//! ## Modules
//!
//! | Module   | Purpose                                            |
//! |----------|----------------------------------------------------|
//! | [`data`] | Record struct, sequential reader, pass-through writer |
//! | [`hint`] | Hint record codec, hint file read/write, path derivation |
//! | [`codec`]| Opaque byte-to-byte compression seam               |

pub mod codec;
mod data;
mod hint;

pub use data::{DataFileReader, DataFileWriter, ParsedRecord, Record};
pub use data::{FLAG_COMPRESSED, HEADER_SIZE, RECORD_ALIGN};
pub use hint::{read_hint_file, write_hint_file, HintRecord};
pub use hint::{hint_path, tmp_hint_path, DATA_SUFFIX, HINT_SUFFIX};

use std::io;
use thiserror::Error;

/// Errors produced by the record and hint codecs.
#[derive(Debug, Error)]
pub enum RecordError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A structurally impossible field was read (oversized lengths,
    /// misaligned offsets, truncated hint entries).
    #[error("corrupt record at {pos}: {reason}")]
    Corrupt {
        /// Byte offset of the offending record or entry.
        pos: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// The compression seam rejected the payload.
    #[error("compression error: {0}")]
    Compression(String),

    /// A key too long to express in a hint record (the key size field is
    /// 8 bits).
    #[error("key of {0} bytes cannot be hinted (max 255)")]
    KeyTooLong(usize),
}
