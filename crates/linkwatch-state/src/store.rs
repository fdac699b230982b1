//! SnapshotStore — in-memory endpoint records for one monitoring session.
//!
//! Records are keyed by endpoint id. Ping fields and alarm fields are
//! mutated through separate entry points so the status resolver and the
//! alarm correlator never overwrite each other's data. Every mutation bumps
//! a revision counter published on a `watch` channel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::types::*;

struct StoreInner {
    records: RwLock<HashMap<EndpointId, EndpointRecord>>,
    revision: watch::Sender<u64>,
}

/// Thread-safe handle to the endpoint records. Cloning shares the store.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<StoreInner>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    /// Create an empty store for a new session.
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                records: RwLock::new(HashMap::new()),
                revision,
            }),
        }
    }

    /// Add `UNVERIFIED` placeholders for endpoints the store has not seen.
    ///
    /// Existing records are kept untouched. Returns the number of
    /// placeholders created.
    pub fn register_endpoints(&self, endpoints: &[NetworkEndpoint]) -> usize {
        let created = {
            let mut records = self.inner.records.write();
            let mut created = 0;
            for endpoint in endpoints {
                if !records.contains_key(&endpoint.id) {
                    records.insert(endpoint.id.clone(), EndpointRecord::placeholder(endpoint));
                    created += 1;
                }
            }
            created
        };

        if created > 0 {
            debug!(created, total = endpoints.len(), "endpoint placeholders registered");
            self.bump();
        }
        created
    }

    pub fn get(&self, endpoint_id: &str) -> Option<EndpointRecord> {
        self.inner.records.read().get(endpoint_id).cloned()
    }

    /// Current status of an endpoint, `None` if it was never registered.
    pub fn status(&self, endpoint_id: &str) -> Option<EndpointStatus> {
        self.inner
            .records
            .read()
            .get(endpoint_id)
            .map(|r| r.ping.status)
    }

    /// Copy of every record, keyed by endpoint id.
    pub fn snapshot(&self) -> HashMap<EndpointId, EndpointRecord> {
        self.inner.records.read().clone()
    }

    /// Mutate the ping fields of an endpoint's record.
    ///
    /// A placeholder is created first if the endpoint is unknown.
    pub fn update_ping<R>(
        &self,
        endpoint: &NetworkEndpoint,
        f: impl FnOnce(&mut EndpointRuntimeState) -> R,
    ) -> R {
        let out = {
            let mut records = self.inner.records.write();
            let record = records
                .entry(endpoint.id.clone())
                .or_insert_with(|| EndpointRecord::placeholder(endpoint));
            f(&mut record.ping)
        };
        self.bump();
        out
    }

    /// Mutate the alarm fields of an endpoint's record.
    ///
    /// A placeholder is created first if the endpoint is unknown.
    pub fn update_alarm<R>(
        &self,
        endpoint: &NetworkEndpoint,
        f: impl FnOnce(&mut AlarmState) -> R,
    ) -> R {
        let out = {
            let mut records = self.inner.records.write();
            let record = records
                .entry(endpoint.id.clone())
                .or_insert_with(|| EndpointRecord::placeholder(endpoint));
            f(&mut record.alarm)
        };
        self.bump();
        out
    }

    /// Apply `f` to the ping fields of every record in one write section.
    pub fn update_all_pings(&self, mut f: impl FnMut(&mut EndpointRuntimeState)) {
        {
            let mut records = self.inner.records.write();
            for record in records.values_mut() {
                f(&mut record.ping);
            }
        }
        self.bump();
    }

    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.read().is_empty()
    }

    /// Number of mutations since the store was created.
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    /// Receiver that observes every revision bump.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|rev| *rev += 1);
    }
}
