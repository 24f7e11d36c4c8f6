//! Per-record single-writer locks.
//!
//! Two handlers touching the same record (a reply turn and the passive
//! group logger, or two quick messages from one user) each load, mutate
//! and save their own copy. Without coordination the later save silently
//! discards the earlier one. Every read-modify-write of a record therefore
//! runs under that record's lock; records with different ids never contend.
//!
//! Entries are created on demand and removed again when the last holder
//! or waiter goes away, so the map only ever holds ids with live turns.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::record::{Record, RecordKind};

type LockKey = (RecordKind, String);

/// Async mutexes keyed by `(kind, id)`.
#[derive(Debug, Clone, Default)]
pub struct RecordLocks {
    inner: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl RecordLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to record `id` of kind `R`.
    pub async fn lock<R: Record>(&self, id: R::Id) -> RecordGuard {
        self.lock_key((R::KIND, id.to_string())).await
    }

    async fn lock_key(&self, key: LockKey) -> RecordGuard {
        // Clone the Arc out so no map shard stays borrowed across the await.
        let mutex = Arc::clone(self.inner.entry(key.clone()).or_default().value());
        let guard = mutex.lock_owned().await;
        trace!(kind = %key.0, id = %key.1, "Record lock acquired");
        RecordGuard {
            guard: Some(guard),
            key,
            table: Arc::clone(&self.inner),
        }
    }

    /// Number of ids with a live lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no record is currently locked or awaited.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Exclusive access to one record; released on drop.
#[derive(Debug)]
pub struct RecordGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: LockKey,
    table: Arc<DashMap<LockKey, Arc<Mutex<()>>>>,
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the table itself still references the mutex: nobody waits.
        self.table
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
