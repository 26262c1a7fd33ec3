use std::{
    collections::BTreeMap,
    sync::RwLock,
    time::{SystemTime, UNIX_EPOCH},
};

use bytes::Bytes;
use tracing::debug;

use crate::record::Record;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

/// The live record set. The ingestion loop is the sole writer; any number of
/// concurrent readers share the same handle. All synchronization is internal,
/// and the lock is held only for the duration of a single operation.
#[derive(Default)]
pub struct LiveStore {
    records: RwLock<BTreeMap<String, Record>>,
}

impl LiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or unconditionally replaces the record at `record.id`.
    pub fn upsert(&self, record: Record) {
        self.records
            .write()
            .expect("store lock poisoned")
            .insert(record.id.clone(), record);
    }

    /// Removes the record for `id` if present. Absent ids are a no-op.
    pub fn delete(&self, id: &str) -> bool {
        self.records
            .write()
            .expect("store lock poisoned")
            .remove(id)
            .is_some()
    }

    /// Drops every record whose expiry is at or before `now_ms` and returns
    /// the number removed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let mut records = self.records.write().expect("store lock poisoned");
        let before = records.len();
        records.retain(|id, record| {
            let keep = !record.expired(now_ms);
            if !keep {
                debug!(%id, "removing expired record");
            }
            keep
        });
        before - records.len()
    }

    /// Point-in-time copy of the current payloads in key order. Payload
    /// handles are refcounted, so no payload bytes are copied.
    pub fn snapshot(&self) -> Vec<Bytes> {
        self.records
            .read()
            .expect("store lock poisoned")
            .values()
            .map(|record| record.payload.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
