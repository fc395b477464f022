//! # client — sharded quorum access to a replica fleet
//!
//! A stateless client for the PodKV storage plane. Keys are hashed
//! into a fixed number of buckets partitioning the 32-bit hash space; each
//! bucket owns an ordered list of replica endpoints, and reads/writes fan
//! out across that list under configurable write/read quorums.
//!
//! ```text
//! key ──fnv1a──▶ bucket ──▶ [replica, replica, replica]
//!                                │
//!                                ▼
//!                     get: first hit wins, earlier
//!                          replicas are repaired
//!                     set: count successes against W
//! ```
//!
//! The engine never raises from the data path: [`StoreClient::get`] returns
//! `Option<Vec<u8>>` and [`StoreClient::set`] returns `bool`. A replica
//! that fails an RPC simply reads as absent (or as one missing success);
//! stale replicas are healed opportunistically by read-repair.
//!
//! ## Module Responsibilities
//!
//! | Module      | Purpose                                           |
//! |-------------|---------------------------------------------------|
//! | [`replica`] | Memcached text-protocol adapter over `TcpStream`  |
//! | [`router`]  | Bucket map and replica ordering                   |
//! | [`quorum`]  | `get`/`set` fan-out, thresholds, read-repair      |

mod quorum;
mod replica;
mod router;

pub use replica::{Replica, ReplicaStore};
pub use router::Router;

use std::collections::HashMap;
use thiserror::Error;

/// Total span of the 32-bit hash space the buckets partition.
pub(crate) const HASH_SPACE: u64 = 1 << 32;

/// Client construction options.
///
/// `servers` maps each replica endpoint (`host:port`) to the bucket ids it
/// owns; the same endpoint may appear in many buckets.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// endpoint → owned bucket ids.
    pub servers: HashMap<String, Vec<u32>>,
    /// Number of buckets partitioning the hash space; must be a power of
    /// two.
    pub buckets_count: u32,
    /// Replication factor. Advisory: the engine uses whatever replicas a
    /// bucket actually contains.
    pub n: usize,
    /// Write quorum: a `set` succeeds once this many replicas accept.
    pub w: usize,
    /// Read quorum. Advisory: `get` walks the whole replica list before
    /// concluding a key is absent, which subsumes any `r` confirmations of
    /// absence up to the list length.
    pub r: usize,
}

impl ClientConfig {
    /// Options with the standard defaults (`buckets_count = 16`, `n = 3`,
    /// `w = 1`, `r = 1`) for the given server map.
    #[must_use]
    pub fn new(servers: HashMap<String, Vec<u32>>) -> Self {
        Self {
            servers,
            buckets_count: 16,
            n: 3,
            w: 1,
            r: 1,
        }
    }
}

/// Rejected client configurations.
///
/// These abort construction; nothing network-facing happens before the
/// config validates.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The server map was empty.
    #[error("no servers configured")]
    NoServers,

    /// `buckets_count` must be a nonzero power of two so the hash space
    /// divides evenly.
    #[error("buckets_count {0} is not a power of two")]
    BadBucketCount(u32),

    /// An endpoint listed a bucket id outside `[0, buckets_count)`.
    #[error("bucket id {id} out of range for {endpoint} (buckets_count {count})")]
    BucketOutOfRange {
        /// The offending endpoint.
        endpoint: String,
        /// The out-of-range bucket id.
        id: u32,
        /// Configured bucket count.
        count: u32,
    },
}

/// The sharded quorum client.
///
/// Owns the router (and through it every replica descriptor); holds no
/// other mutable state, so shared references can issue `get`/`set`
/// concurrently as long as the replica type allows it.
pub struct StoreClient<R: ReplicaStore = Replica> {
    pub(crate) router: Router<R>,
    pub(crate) w: usize,
    #[allow(dead_code)]
    pub(crate) r: usize,
}

impl StoreClient<Replica> {
    /// Builds a client for the given configuration, dialing every
    /// endpoint.
    ///
    /// A replica that cannot be reached is kept in its buckets — its RPCs
    /// fail until the node comes back — so construction only fails on a
    /// configuration error.
    pub fn open(config: &ClientConfig) -> Result<Self, ConfigError> {
        let router = Router::open(config, Replica::connect)?;
        Ok(Self {
            router,
            w: config.w,
            r: config.r,
        })
    }
}

impl<R: ReplicaStore> StoreClient<R> {
    /// Builds a client over caller-supplied replica transports.
    ///
    /// The factory is called once per endpoint in the server map. This is
    /// the seam in-process tests (and alternative transports) plug into.
    pub fn with_transport<F>(config: &ClientConfig, factory: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> R,
    {
        let router = Router::open(config, factory)?;
        Ok(Self {
            router,
            w: config.w,
            r: config.r,
        })
    }

    /// The router backing this client.
    #[must_use]
    pub fn router(&self) -> &Router<R> {
        &self.router
    }
}

#[cfg(test)]
mod tests;
