//! Opaque byte-to-byte compression seam.
//!
//! Hint files and compressed record values pass through these two
//! functions and nothing else, so the codec can be swapped without
//! touching any format logic. Backed by the raw (non-framed) snappy
//! encoder, which round-trips arbitrary byte strings including the empty
//! one.

use crate::RecordError;

/// Compresses `data` into a self-describing blob.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, RecordError> {
    snap::raw::Encoder::new()
        .compress_vec(data)
        .map_err(|e| RecordError::Compression(e.to_string()))
}

/// Decompresses a blob produced by [`compress`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, RecordError> {
    snap::raw::Decoder::new()
        .decompress_vec(data)
        .map_err(|e| RecordError::Compression(e.to_string()))
}
