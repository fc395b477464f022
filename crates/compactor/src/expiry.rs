use anyhow::{bail, Context, Result};

use crate::SECONDS_PER_DAY;

/// One expiry tier: records at least `size` bytes large expire once they
/// are `days` old.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    /// Minimum stored value size for this tier to apply.
    pub size: u64,
    /// Age in days at which a matching record expires.
    pub days: u32,
}

/// Size/age tiered expiry rules.
///
/// Tiers are held sorted by size descending; the first tier whose size a
/// record reaches is authoritative — its day threshold alone decides, and
/// smaller tiers are not consulted. A record smaller than every tier
/// never expires.
#[derive(Debug, Clone, Default)]
pub struct ExpiryPolicy {
    tiers: Vec<Tier>,
}

impl ExpiryPolicy {
    /// Parses a comma-separated `SIZE:DAYS` tier list, e.g.
    /// `10K:30,10M:11`. Sizes take an optional case-insensitive `K` or
    /// `M` suffix; a bare number is bytes. Any malformed entry fails the
    /// whole parse.
    pub fn parse(ranges: &str) -> Result<Self> {
        let mut policy = Self::default();
        for part in ranges.split(',') {
            let part = part.trim();
            let (size_str, days_str) = part
                .split_once(':')
                .with_context(|| format!("expiry tier '{}' is not SIZE:DAYS", part))?;
            let size = parse_size(size_str)?;
            let days: u32 = days_str
                .parse()
                .with_context(|| format!("bad expiry days '{}'", days_str))?;
            policy.push_tier(Tier { size, days });
        }
        Ok(policy)
    }

    /// Adds the legacy single-tier shorthand: everything of at least
    /// `size_limit` bytes expires after `expire_days`.
    pub fn with_legacy(mut self, expire_days: u32, size_limit: u64) -> Self {
        self.push_tier(Tier {
            size: size_limit,
            days: expire_days,
        });
        self
    }

    fn push_tier(&mut self, tier: Tier) {
        self.tiers.push(tier);
        // Largest size first; evaluation walks this order.
        self.tiers.sort_by(|a, b| b.size.cmp(&a.size));
    }

    /// The tiers, size-descending.
    #[must_use]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Whether a record written at `tstamp` with a `vsz`-byte stored
    /// value counts as expired at time `now`.
    #[must_use]
    pub fn is_expired(&self, now: i64, tstamp: i32, vsz: u32) -> bool {
        for tier in &self.tiers {
            if u64::from(vsz) >= tier.size {
                return i64::from(tstamp) <= now - i64::from(tier.days) * SECONDS_PER_DAY;
            }
        }
        false
    }
}

/// Parses a size like `512`, `10K`, or `3m` into bytes.
fn parse_size(input: &str) -> Result<u64> {
    let s = input.trim();
    if s.is_empty() {
        bail!("empty expiry size");
    }
    let (digits, multiplier) = match s.chars().last() {
        Some('k') | Some('K') => (&s[..s.len() - 1], 1024u64),
        Some('m') | Some('M') => (&s[..s.len() - 1], 1024 * 1024),
        _ => (s, 1),
    };
    let n: u64 = digits
        .parse()
        .with_context(|| format!("bad expiry size '{}'", input))?;
    Ok(n * multiplier)
}
