use std::collections::{BTreeSet, HashMap};

use crate::expiry::ExpiryPolicy;
use crate::index::FileIndex;

/// Why a record is scheduled for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A later occurrence of the key exists, or the record is a
    /// tombstone.
    Superseded,
    /// The expiry policy aged the record out.
    Expired,
}

/// The planner's output: which `(file, key, ver)` occurrences die, and
/// which files therefore need rewriting.
#[derive(Debug, Default)]
pub struct CompactionPlan {
    /// `(tag, key, ver)` → reason. `tag` is the file's position in the
    /// ascending directory listing.
    pub drops: HashMap<(usize, Vec<u8>, i32), DropReason>,
    /// Tags of files containing at least one drop, ascending.
    pub files: BTreeSet<usize>,
}

impl CompactionPlan {
    /// Looks up the fate of one record occurrence.
    #[must_use]
    pub fn drop_reason(&self, tag: usize, key: &[u8], ver: i32) -> Option<DropReason> {
        // HashMap can't borrow-match a composite key; build the owned
        // triple only here, on the rewrite path's per-record lookup.
        self.drops.get(&(tag, key.to_vec(), ver)).copied()
    }

    fn mark(&mut self, tag: usize, key: Vec<u8>, ver: i32, reason: DropReason) {
        self.drops.insert((tag, key, ver), reason);
        self.files.insert(tag);
    }
}

/// Builds the delete set for a directory's indexes, given in ascending
/// file order.
///
/// Every record occurrence is visited in file order, tracking the latest
/// occurrence of each key across the whole directory. An occurrence
/// supersedes whatever occurrence preceded it — in an earlier file or
/// earlier in the same file — regardless of version numbers: file order
/// is the version order. A tombstone additionally schedules itself, and
/// an occurrence whose write time the policy ages out is dropped as
/// expired. Expiry requires a known `tstamp`, so hint-loaded indexes are
/// never expiry-checked (the caller must scan when a policy is active).
#[must_use]
pub fn plan(indexes: &[FileIndex], policy: Option<&ExpiryPolicy>, now: i64) -> CompactionPlan {
    let mut plan = CompactionPlan::default();
    // key → (tag, ver) of the latest occurrence seen so far.
    let mut latest: HashMap<Vec<u8>, (usize, i32)> = HashMap::new();

    for (tag, index) in indexes.iter().enumerate() {
        for entry in &index.entries {
            if let Some(&(old_tag, old_ver)) = latest.get(&entry.key) {
                plan.mark(old_tag, entry.key.clone(), old_ver, DropReason::Superseded);
            }

            if entry.ver < 0 {
                plan.mark(tag, entry.key.clone(), entry.ver, DropReason::Superseded);
            } else if let (Some(policy), Some(tstamp), Some(vsz)) =
                (policy, entry.tstamp, entry.vsz)
            {
                if policy.is_expired(now, tstamp, vsz) {
                    plan.mark(tag, entry.key.clone(), entry.ver, DropReason::Expired);
                }
            }

            latest.insert(entry.key.clone(), (tag, entry.ver));
        }
    }

    plan
}
