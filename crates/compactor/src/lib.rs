//! # compactor — offline maintenance of PodKV data directories
//!
//! Scans a directory of append-only data files (with their compressed
//! hint-file sidecars), works out which records are dead, and rewrites
//! exactly the files that contain any. Single-threaded, one file at a
//! time; the server owning the directory must be stopped or coordinated
//! externally.
//!
//! ```text
//! directory scan ──▶ per-file index ──▶ cross-file merge
//!                                            │
//!                                      delete set (tag, key, ver)
//!                                            │
//!                              per-file rewrite + hint rebuild
//! ```
//!
//! A record is dead when a later occurrence of its key exists (file order
//! is version order), when it is a tombstone, or when the optional tiered
//! expiry policy ages it out. Rewrites are atomic: temp data and hint
//! files are fsynced and renamed into place, data first, so a crash never
//! leaves a hint newer than its data file.
//!
//! ## Module Responsibilities
//!
//! | Module      | Purpose                                         |
//! |-------------|-------------------------------------------------|
//! | [`index`]   | Directory listing, per-file and global indexes  |
//! | [`expiry`]  | `SIZE:DAYS` tier parsing and evaluation         |
//! | [`planner`] | Delete-set construction across files            |
//! | [`rewrite`] | File rewriting, hint building, orchestration    |
//! | [`verify`]  | Hint-vs-data and hint-vs-tmp validation         |

pub mod expiry;
pub mod index;
pub mod planner;
pub mod rewrite;
pub mod verify;

pub use expiry::ExpiryPolicy;
pub use index::{build_index, data_files, live_keys, FileIndex, IndexEntry};
pub use planner::{plan, CompactionPlan, DropReason};
pub use rewrite::{build_hints, compact_dir, compact_file, DirStats, RewriteStats};
pub use verify::{verify_hints, verify_tmp_hints, HintDiff};

/// Seconds per expiry day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Wall-clock now as Unix seconds, for planner and policy callers that
/// don't inject their own.
#[must_use]
pub fn unix_now() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests;
