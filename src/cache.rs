//! Caller-owned caching of fetched record sets.
//!
//! Fetching flows, connection references, and connections is expensive, so
//! callers typically want to reuse one snapshot across repeated aggregation
//! runs. The cache is an explicit object handed around by the caller, with an
//! explicit invalidation call; the aggregator itself holds no ambient state.

use crate::records::{ConnectionRecord, ConnectionReferenceRecord, FlowRecord};
use ahash::AHashMap;

/// One fetched snapshot of the three record collections for a scope.
#[derive(Debug, Clone, Default)]
pub struct CachedRecords {
    pub flows: Vec<FlowRecord>,
    pub connection_references: Vec<ConnectionReferenceRecord>,
    pub connections: Vec<ConnectionRecord>,
}

/// Record snapshots keyed by scope (an environment or solution identifier
/// chosen by the caller).
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: AHashMap<String, CachedRecords>,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a snapshot for a scope, replacing any previous one.
    pub fn insert(&mut self, scope: impl Into<String>, records: CachedRecords) {
        self.entries.insert(scope.into(), records);
    }

    pub fn get(&self, scope: &str) -> Option<&CachedRecords> {
        self.entries.get(scope)
    }

    /// Drops the snapshot for one scope, forcing the next run to refetch.
    pub fn invalidate(&mut self, scope: &str) -> bool {
        self.entries.remove(scope).is_some()
    }

    /// Drops every snapshot.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
