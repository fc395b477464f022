use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::ReplicaStore;

mod router_tests;

/// In-memory stand-in for a storage node. Cloning shares the node, so a
/// test keeps handles to the replicas it hands the client.
#[derive(Clone)]
pub(crate) struct FakeReplica {
    endpoint: String,
    inner: Arc<FakeInner>,
}

struct FakeInner {
    map: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
    up: AtomicBool,
    accept_writes: AtomicBool,
}

impl FakeReplica {
    pub(crate) fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            inner: Arc::new(FakeInner {
                map: Mutex::new(HashMap::new()),
                up: AtomicBool::new(true),
                accept_writes: AtomicBool::new(true),
            }),
        }
    }

    pub(crate) fn kill(&self) {
        self.inner.up.store(false, Ordering::SeqCst);
    }

    pub(crate) fn refuse_writes(&self) {
        self.inner.accept_writes.store(false, Ordering::SeqCst);
    }

    pub(crate) fn preload(&self, key: &[u8], value: &[u8]) {
        self.inner
            .map
            .lock()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
    }

    pub(crate) fn peek(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.inner.map.lock().unwrap().get(key).cloned()
    }
}

impl ReplicaStore for FakeReplica {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        if !self.inner.up.load(Ordering::SeqCst) {
            return None;
        }
        self.peek(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) -> bool {
        if !self.inner.up.load(Ordering::SeqCst)
            || !self.inner.accept_writes.load(Ordering::SeqCst)
        {
            return false;
        }
        self.preload(key, value);
        true
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// One bucket, three replicas, every endpoint owning bucket 0.
pub(crate) fn three_replica_client(
    w: usize,
) -> (crate::StoreClient<FakeReplica>, Vec<FakeReplica>) {
    let endpoints = ["10.0.0.1:7900", "10.0.0.2:7900", "10.0.0.3:7900"];
    let fakes: HashMap<String, FakeReplica> = endpoints
        .iter()
        .map(|ep| (ep.to_string(), FakeReplica::new(ep)))
        .collect();

    let mut config = crate::ClientConfig::new(
        endpoints
            .iter()
            .map(|ep| (ep.to_string(), vec![0u32]))
            .collect(),
    );
    config.buckets_count = 1;
    config.w = w;

    let client = crate::StoreClient::with_transport(&config, |ep| fakes[ep].clone()).unwrap();

    // Hand back the replicas in the order the router consults them.
    let ordered = client
        .router()
        .bucket(0)
        .iter()
        .map(|&i| client.router().replica(i).clone())
        .collect();
    (client, ordered)
}
