//! # fnvhash — 32-bit FNV-1a and content fingerprinting
//!
//! The two hash functions every other PodKV crate agrees on:
//!
//! - [`fnv1a`] maps keys to buckets and orders replica endpoints within a
//!   bucket. It is the plain 32-bit FNV-1a with the standard parameters.
//! - [`content_hash`] fingerprints record *values*. Hint files persist only
//!   its low 16 bits, so readers comparing a recomputed fingerprint against
//!   a hint entry must mask accordingly (see [`HINT_HASH_MASK`]).
//!
//! Both functions are deterministic and wrap at 32 bits at every step, so
//! the same bytes hash identically on every platform.
//!
//! ## Example
//!
//! ```rust
//! use fnvhash::{content_hash, fnv1a};
//!
//! assert_eq!(fnv1a(b""), 0x811c_9dc5);
//! assert_eq!(content_hash(b"beans"), content_hash(b"beans"));
//! ```

/// FNV-1a offset basis.
const FNV_OFFSET: u32 = 0x811c_9dc5;
/// FNV-1a prime.
const FNV_PRIME: u32 = 0x0100_0193;

/// Values this long or shorter are fingerprinted in full; longer values are
/// fingerprinted from their first and last 512 bytes only.
const FULL_HASH_LIMIT: usize = 1024;

/// Mask selecting the bits of [`content_hash`] that survive into a hint
/// record.
pub const HINT_HASH_MASK: u32 = 0xffff;

/// 32-bit FNV-1a over `data`.
///
/// Per byte: `h ^= b; h *= FNV_PRIME`, wrapping at 32 bits.
#[must_use]
pub fn fnv1a(data: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Content fingerprint of a record value.
///
/// `h = len * 97`, then for short values (`len <= 1024`) add the FNV-1a of
/// the whole value; for longer values add the FNV-1a of the first 512
/// bytes, multiply by 97 again, and add the FNV-1a of the last 512 bytes.
/// Every arithmetic step wraps at 32 bits.
///
/// Values that were stored compressed must be fingerprinted in their
/// *decompressed* form; callers own that decompression.
#[must_use]
pub fn content_hash(data: &[u8]) -> u32 {
    let len = data.len();
    let mut hash = (len as u32).wrapping_mul(97);
    if len <= FULL_HASH_LIMIT {
        hash = hash.wrapping_add(fnv1a(data));
    } else {
        hash = hash.wrapping_add(fnv1a(&data[..512]));
        hash = hash.wrapping_mul(97);
        hash = hash.wrapping_add(fnv1a(&data[len - 512..]));
    }
    hash
}
