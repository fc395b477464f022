use tracing::{debug, warn};

use crate::replica::ReplicaStore;
use crate::StoreClient;

impl<R: ReplicaStore> StoreClient<R> {
    /// Reads `key` from its bucket's replicas in order.
    ///
    /// The first replica that returns a value wins. Every replica earlier
    /// in the list — each of which just read as absent — is then healed
    /// with a repair `set` of the winning value; repair failures are
    /// ignored. Only when the whole list reads as absent is `None`
    /// returned.
    ///
    /// Transport failures count as absence, so a flapping node neither
    /// blocks the read nor poisons the result.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let replicas = self.router.replicas_for(key);
        for (i, &winner) in replicas.iter().enumerate() {
            let Some(value) = self.router.replica(winner).get(key) else {
                continue;
            };
            for &stale in &replicas[..i] {
                let repaired = self.router.replica(stale).set(key, &value);
                debug!(
                    endpoint = self.router.replica(stale).endpoint(),
                    repaired, "read-repair"
                );
            }
            return Some(value);
        }
        None
    }

    /// Writes `key` to every replica of its bucket, sequentially.
    ///
    /// Succeeds once at least `W` replicas accept. Short of that, the
    /// write is reconciled through a quorum [`get`](Self::get) — which
    /// itself spreads whatever value it finds — and still counts as
    /// success if the read-back equals the intended value.
    pub fn set(&self, key: &[u8], value: &[u8]) -> bool {
        let replicas = self.router.replicas_for(key);
        let mut accepted = 0usize;
        for &index in replicas {
            if self.router.replica(index).set(key, value) {
                accepted += 1;
            }
        }
        if accepted >= self.w {
            return true;
        }

        warn!(
            accepted,
            required = self.w,
            "write quorum missed, reconciling via read"
        );
        match self.get(key) {
            Some(stored) => stored == value,
            None => false,
        }
    }
}
