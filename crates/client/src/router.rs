use fnvhash::fnv1a;

use crate::replica::ReplicaStore;
use crate::{ClientConfig, ConfigError, HASH_SPACE};

/// Maps keys to ordered replica lists via consistent hash bucketing.
///
/// The 32-bit hash space is split into `buckets_count` equal contiguous
/// ranges. Each bucket holds the replicas that own it, ordered by the
/// FNV-1a hash of the endpoint string (ties broken by registration
/// order), so every client derives the same replica order independently.
///
/// The router exclusively owns all replica descriptors; buckets store
/// indexes into that vector. Nothing here mutates after construction, and
/// a replica is never dropped at runtime — a dead node is simply one that
/// fails its RPCs.
pub struct Router<R: ReplicaStore> {
    replicas: Vec<R>,
    /// Per bucket: indexes into `replicas`, sorted by endpoint hash.
    buckets: Vec<Vec<usize>>,
    bucket_size: u64,
}

impl<R: ReplicaStore> Router<R> {
    /// Builds the bucket map, creating one replica per endpoint via
    /// `factory` and registering it into every bucket it owns.
    pub fn open<F>(config: &ClientConfig, mut factory: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> R,
    {
        if config.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if config.buckets_count == 0 || !config.buckets_count.is_power_of_two() {
            return Err(ConfigError::BadBucketCount(config.buckets_count));
        }
        for (endpoint, bucket_ids) in &config.servers {
            if let Some(&id) = bucket_ids.iter().find(|&&id| id >= config.buckets_count) {
                return Err(ConfigError::BucketOutOfRange {
                    endpoint: endpoint.clone(),
                    id,
                    count: config.buckets_count,
                });
            }
        }

        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); config.buckets_count as usize];
        let mut replicas = Vec::with_capacity(config.servers.len());

        // Deterministic registration order so hash ties break identically
        // on every client.
        let mut endpoints: Vec<&String> = config.servers.keys().collect();
        endpoints.sort();

        for endpoint in endpoints {
            let index = replicas.len();
            replicas.push(factory(endpoint));
            for &bucket_id in &config.servers[endpoint] {
                buckets[bucket_id as usize].push(index);
            }
        }

        // Order every bucket's replicas by endpoint hash. All buckets are
        // sorted uniformly, the last one included.
        for bucket in &mut buckets {
            bucket.sort_by_key(|&i| (fnv1a(replicas[i].endpoint().as_bytes()), i));
        }

        Ok(Self {
            replicas,
            buckets,
            bucket_size: HASH_SPACE / u64::from(config.buckets_count),
        })
    }

    /// The bucket a key belongs to; always in `[0, buckets_count)`.
    #[must_use]
    pub fn bucket_of(&self, key: &[u8]) -> usize {
        (u64::from(fnv1a(key)) / self.bucket_size) as usize
    }

    /// The ordered replica indexes owning `key`'s bucket. May be empty
    /// when no endpoint registered for that bucket.
    #[must_use]
    pub fn replicas_for(&self, key: &[u8]) -> &[usize] {
        &self.buckets[self.bucket_of(key)]
    }

    /// The replica descriptor at `index`.
    #[must_use]
    pub fn replica(&self, index: usize) -> &R {
        &self.replicas[index]
    }

    /// Number of buckets partitioning the hash space.
    #[must_use]
    pub fn buckets_count(&self) -> usize {
        self.buckets.len()
    }

    /// The ordered replica indexes of one bucket.
    #[must_use]
    pub fn bucket(&self, id: usize) -> &[usize] {
        &self.buckets[id]
    }
}
