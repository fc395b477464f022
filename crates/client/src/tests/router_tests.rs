use fnvhash::fnv1a;
use std::collections::HashMap;

use super::FakeReplica;
use crate::{ClientConfig, ConfigError, ReplicaStore, Router};

fn config(servers: &[(&str, &[u32])], buckets_count: u32) -> ClientConfig {
    let mut cfg = ClientConfig::new(
        servers
            .iter()
            .map(|(ep, ids)| (ep.to_string(), ids.to_vec()))
            .collect(),
    );
    cfg.buckets_count = buckets_count;
    cfg
}

fn open(cfg: &ClientConfig) -> Result<Router<FakeReplica>, ConfigError> {
    Router::open(cfg, FakeReplica::new)
}

// -------------------- Validation --------------------

#[test]
fn empty_server_map_is_rejected() {
    let cfg = config(&[], 16);
    assert!(matches!(open(&cfg), Err(ConfigError::NoServers)));
}

#[test]
fn non_power_of_two_bucket_count_is_rejected() {
    for count in [0u32, 3, 12, 100] {
        let cfg = config(&[("a:1", &[0])], count);
        assert!(
            matches!(open(&cfg), Err(ConfigError::BadBucketCount(c)) if c == count),
            "count {} should be rejected",
            count
        );
    }
}

#[test]
fn out_of_range_bucket_id_is_rejected() {
    let cfg = config(&[("a:1", &[0, 16])], 16);
    assert!(matches!(
        open(&cfg),
        Err(ConfigError::BucketOutOfRange { id: 16, .. })
    ));
}

// -------------------- Bucket mapping --------------------

#[test]
fn bucket_of_matches_hash_division() {
    let all: Vec<u32> = (0..16).collect();
    let cfg = config(&[("a:1", &all)], 16);
    let router = open(&cfg).unwrap();

    let bucket_size = (1u64 << 32) / 16;
    for key in [&b"k"[..], b"another", b"/photo/1234.jpg", b""] {
        let expected = (u64::from(fnv1a(key)) / bucket_size) as usize;
        assert_eq!(router.bucket_of(key), expected);
        assert!(router.bucket_of(key) < 16);
    }
}

#[test]
fn every_key_lands_in_range() {
    let all: Vec<u32> = (0..16).collect();
    let cfg = config(&[("a:1", &all)], 16);
    let router = open(&cfg).unwrap();

    for i in 0..10_000u32 {
        let key = format!("key-{}", i);
        assert!(router.bucket_of(key.as_bytes()) < 16);
    }
}

#[test]
fn single_bucket_owns_whole_space() {
    let cfg = config(&[("a:1", &[0])], 1);
    let router = open(&cfg).unwrap();
    assert_eq!(router.bucket_of(b"anything"), 0);
    assert_eq!(router.replicas_for(b"anything").len(), 1);
}

// -------------------- Replica ordering --------------------

#[test]
fn buckets_are_sorted_by_endpoint_hash() {
    let endpoints = ["z:1", "m:1", "a:1", "q:1"];
    let servers: Vec<(&str, &[u32])> = endpoints.iter().map(|ep| (*ep, &[0u32, 1][..])).collect();
    let cfg = config(&servers, 2);
    let router = open(&cfg).unwrap();

    // Every bucket, including the last, is ordered by endpoint hash.
    for id in 0..router.buckets_count() {
        let hashes: Vec<u32> = router
            .bucket(id)
            .iter()
            .map(|&i| fnv1a(router.replica(i).endpoint().as_bytes()))
            .collect();
        let mut sorted = hashes.clone();
        sorted.sort_unstable();
        assert_eq!(hashes, sorted, "bucket {} out of order", id);
        assert_eq!(hashes.len(), endpoints.len());
    }
}

#[test]
fn replica_order_is_stable_across_constructions() {
    let servers: Vec<(&str, &[u32])> = vec![
        ("10.0.0.1:7900", &[0, 1]),
        ("10.0.0.2:7900", &[0]),
        ("10.0.0.3:7900", &[1]),
    ];
    let cfg = config(&servers, 2);

    let order = |r: &Router<FakeReplica>, id: usize| -> Vec<String> {
        r.bucket(id)
            .iter()
            .map(|&i| r.replica(i).endpoint().to_string())
            .collect()
    };

    let a = open(&cfg).unwrap();
    let b = open(&cfg).unwrap();
    for id in 0..2 {
        assert_eq!(order(&a, id), order(&b, id));
    }
}

#[test]
fn endpoint_may_serve_many_buckets() {
    let cfg = config(&[("a:1", &[0, 1, 2, 3])], 4);
    let router = open(&cfg).unwrap();
    for id in 0..4 {
        assert_eq!(router.bucket(id).len(), 1);
    }
}

#[test]
fn unowned_bucket_is_empty() {
    let cfg = config(&[("a:1", &[0])], 2);
    let router = open(&cfg).unwrap();
    assert!(router.bucket(1).is_empty());
}

#[test]
fn default_config_values() {
    let cfg = ClientConfig::new(HashMap::from([("a:1".to_string(), vec![0])]));
    assert_eq!(cfg.buckets_count, 16);
    assert_eq!(cfg.n, 3);
    assert_eq!(cfg.w, 1);
    assert_eq!(cfg.r, 1);
}
