//! The durable record store.
//!
//! Get-or-default / put over two record namespaces, backed by a
//! [`SlotBackend`]. The store's contract is deliberately forgiving:
//!
//! - [`RecordStore::load`] and [`RecordStore::get_or_create`] never fail.
//!   A missing slot yields a default record; an unreadable slot is moved
//!   to the kind's backup namespace and also yields a default record.
//! - When the backend cannot be read, or an unreadable slot cannot be
//!   moved aside, the default is tagged [`LoadState::ReadFailed`]. Such a
//!   record must not be saved: the slot may still hold real data.
//! - [`RecordStore::save`] logs and counts failures instead of returning
//!   them. [`RecordStore::try_save`] is the propagating variant.
//! - [`RecordStore::list_all`] skips unreadable slots.
//!
//! Loading never writes: a default record only becomes durable once a
//! caller saves it.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::config::{BackendKind, ConfidantConfig, RecordsConfig};
use crate::error::{ConfidantError, Result};
use crate::locks::RecordLocks;
use crate::metrics::ConfidantCounters;
use crate::persistence::{MemorySlots, SlotBackend, SqliteSlots};
use crate::record::Record;

/// How [`RecordStore::get_or_create`] obtained its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Decoded from a persisted slot.
    Found,
    /// Fresh default: the slot was empty, or was unreadable and has been
    /// moved to the backup namespace.
    Created,
    /// Fresh default standing in for a slot that could not be read or
    /// backed up. Saving it would overwrite whatever the slot holds.
    ReadFailed,
}

impl LoadState {
    /// Whether the record was freshly constructed and is not yet durable.
    #[must_use]
    pub const fn is_created(self) -> bool {
        matches!(self, Self::Created)
    }

    /// Whether saving the record may replace the persisted slot.
    #[must_use]
    pub const fn can_save(self) -> bool {
        !matches!(self, Self::ReadFailed)
    }
}

/// Keyed persistence of user and group records.
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn SlotBackend>,
    config: RecordsConfig,
    locks: RecordLocks,
    counters: Arc<ConfidantCounters>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("config", &self.config)
            .field("locked_records", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Wrap an existing backend.
    #[must_use]
    pub fn new(backend: Arc<dyn SlotBackend>, config: RecordsConfig) -> Self {
        Self {
            backend,
            config,
            locks: RecordLocks::new(),
            counters: Arc::new(ConfidantCounters::new()),
        }
    }

    /// Open the backend named by `config.persistence`.
    ///
    /// # Errors
    /// Returns [`ConfidantError::Database`] if the SQLite file cannot be opened.
    pub fn open(config: &ConfidantConfig) -> Result<Self> {
        let backend: Arc<dyn SlotBackend> = match config.persistence.backend {
            BackendKind::Sqlite => Arc::new(SqliteSlots::open(
                &config.persistence.path,
                &config.persistence,
            )?),
            BackendKind::Memory => Arc::new(MemorySlots::new()),
        };
        Ok(Self::new(backend, config.records.clone()))
    }

    /// An in-process store, for tests and the `memory` backend.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySlots::new()), RecordsConfig::default())
    }

    /// Record defaults and capacities.
    #[must_use]
    pub fn config(&self) -> &RecordsConfig {
        &self.config
    }

    /// The per-record lock table shared by every clone of this store.
    #[must_use]
    pub fn locks(&self) -> &RecordLocks {
        &self.locks
    }

    /// Counters shared by every clone of this store.
    #[must_use]
    pub fn counters(&self) -> &Arc<ConfidantCounters> {
        &self.counters
    }

    /// The underlying slot backend.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn SlotBackend> {
        &self.backend
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Load a record, or a fresh default if none is persisted (or the
    /// persisted slot is unreadable). Never fails and never writes a
    /// default back.
    #[must_use]
    pub fn load<R: Record>(&self, id: R::Id) -> R {
        self.get_or_create(id).0
    }

    /// Load a record and report how it was obtained.
    ///
    /// [`LoadState::Created`] means the returned record is not durable
    /// until the caller saves it. [`LoadState::ReadFailed`] means it must
    /// not be saved at all.
    #[must_use]
    pub fn get_or_create<R: Record>(&self, id: R::Id) -> (R, LoadState) {
        match self.fetch::<R>(id) {
            Ok(Some(record)) => {
                ConfidantCounters::bump(&self.counters.records_loaded);
                (record, LoadState::Found)
            }
            Ok(None) => {
                ConfidantCounters::bump(&self.counters.records_created);
                (R::new_default(id, &self.config), LoadState::Created)
            }
            Err(err @ ConfidantError::CorruptSlot { .. }) => {
                warn!(kind = %R::KIND, %id, error = %err, "Unreadable record slot, starting fresh");
                if self.quarantine::<R>(id) {
                    ConfidantCounters::bump(&self.counters.records_created);
                    (R::new_default(id, &self.config), LoadState::Created)
                } else {
                    ConfidantCounters::bump(&self.counters.read_failures);
                    (R::new_default(id, &self.config), LoadState::ReadFailed)
                }
            }
            Err(err) => {
                ConfidantCounters::bump(&self.counters.read_failures);
                error!(
                    kind = %R::KIND,
                    %id,
                    error = %err,
                    "Record read failed, using unsaved default"
                );
                (R::new_default(id, &self.config), LoadState::ReadFailed)
            }
        }
    }

    /// Read and decode one slot.
    ///
    /// # Errors
    /// [`ConfidantError::CorruptSlot`] if the bytes do not decode, or any
    /// backend error.
    pub fn fetch<R: Record>(&self, id: R::Id) -> Result<Option<R>> {
        let start = Instant::now();
        let key = id.to_string();
        let Some(data) = self.backend.read(R::KIND.namespace(), &key)? else {
            return Ok(None);
        };

        let record = decode::<R>(&key, &data)?;
        debug!(
            kind = %R::KIND,
            id = %key,
            bytes = data.len(),
            elapsed_us = start.elapsed().as_micros(),
            "Loaded record"
        );
        Ok(Some(record))
    }

    /// Every readable record of kind `R`, in backend enumeration order.
    ///
    /// Unreadable slots are logged and skipped; a backend failure yields
    /// an empty list.
    #[must_use]
    pub fn list_all<R: Record>(&self) -> Vec<R> {
        let slots = match self.backend.list(R::KIND.namespace()) {
            Ok(slots) => slots,
            Err(err) => {
                error!(kind = %R::KIND, error = %err, "Listing records failed");
                return Vec::new();
            }
        };

        slots
            .into_iter()
            .filter_map(|(key, data)| match decode::<R>(&key, &data) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(kind = %R::KIND, id = %key, error = %err, "Skipping unreadable record");
                    None
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Persist the full record, overwriting any prior slot.
    ///
    /// Failures are logged and counted, never returned: the in-memory copy
    /// stays authoritative until the next successful save.
    pub fn save<R: Record>(&self, record: &R) {
        if let Err(err) = self.try_save(record) {
            ConfidantCounters::bump(&self.counters.save_failures);
            error!(kind = %R::KIND, id = %record.id(), error = %err, "Record save failed");
        }
    }

    /// Persist the full record, returning any failure.
    ///
    /// # Errors
    /// [`ConfidantError::Serialization`] or any backend error.
    pub fn try_save<R: Record>(&self, record: &R) -> Result<()> {
        let json =
            serde_json::to_vec(record).map_err(|e| ConfidantError::Serialization(e.to_string()))?;
        self.backend
            .write(R::KIND.namespace(), &record.id().to_string(), &json)?;
        ConfidantCounters::bump(&self.counters.saves_completed);
        Ok(())
    }

    /// Locked read-modify-write of one record.
    ///
    /// Loads (or creates) the record under its lock, applies `mutate`,
    /// saves, and returns the saved copy. If the slot could not be read the
    /// mutation is applied to a default and not saved.
    pub async fn update<R, F>(&self, id: R::Id, mutate: F) -> R
    where
        R: Record,
        F: FnOnce(&mut R),
    {
        let _guard = self.locks.lock::<R>(id).await;
        let (mut record, state) = self.get_or_create::<R>(id);
        mutate(&mut record);
        if state.can_save() {
            self.save(&record);
        } else {
            warn!(kind = %R::KIND, %id, "Skipping save of a record that failed to load");
        }
        record
    }

    /// Move an unreadable slot aside. Returns `false` if it is still in place.
    fn quarantine<R: Record>(&self, id: R::Id) -> bool {
        let key = id.to_string();
        match self
            .backend
            .quarantine(R::KIND.namespace(), &key, R::KIND.backup_namespace())
        {
            Ok(Some(backup_key)) => {
                ConfidantCounters::bump(&self.counters.corrupt_slots_recovered);
                warn!(
                    kind = %R::KIND,
                    id = %key,
                    backup = %backup_key,
                    "Unreadable slot moved to backup"
                );
                true
            }
            Ok(None) => true,
            Err(err) => {
                error!(
                    kind = %R::KIND,
                    id = %key,
                    error = %err,
                    "Could not back up unreadable slot"
                );
                false
            }
        }
    }
}

fn decode<R: Record>(key: &str, data: &[u8]) -> Result<R> {
    serde_json::from_slice(data).map_err(|e| ConfidantError::CorruptSlot {
        kind: R::KIND,
        id: key.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::record::{GroupRecord, RecordKind, UserRecord};
    use crate::types::{ChatId, Role, UserId};

    #[test]
    fn never_seen_id_yields_unsaved_default() {
        let store = RecordStore::in_memory();
        let (user, state) = store.get_or_create::<UserRecord>(UserId(1));
        assert_eq!(state, LoadState::Created);
        assert!(user.facts.is_empty());
        assert!(user.history.is_empty());
        assert_eq!(user.language, "en");
        assert!(store.backend().read("user", "1").expect("read").is_none());
    }

    #[test]
    fn save_then_load_returns_persisted_record() {
        let store = RecordStore::in_memory();
        let mut user: UserRecord = store.load(UserId(1));
        user.merge_facts([("name".to_string(), "Alex".to_string())]);
        user.push_history(Role::User, "hi", 15);
        store.save(&user);

        let (loaded, state) = store.get_or_create::<UserRecord>(UserId(1));
        assert_eq!(state, LoadState::Found);
        assert_eq!(loaded, user);
    }

    #[test]
    fn corrupt_slot_is_backed_up_and_replaced_by_default() {
        let store = RecordStore::in_memory();
        store.backend().write("user", "3", b"{\"id\": 3, \"facts\": [").expect("write");

        let (user, state) = store.get_or_create::<UserRecord>(UserId(3));
        assert_eq!(state, LoadState::Created);
        assert!(user.facts.is_empty());

        assert!(store.backend().read("user", "3").expect("read").is_none());
        let backups = store.backend().list(RecordKind::User.backup_namespace()).expect("list");
        assert_eq!(backups.len(), 1);
        assert_eq!(backups[0].1, b"{\"id\": 3, \"facts\": [");
        assert_eq!(store.counters().snapshot().corrupt_slots_recovered, 1);
    }

    #[test]
    fn list_all_skips_unreadable_slots() {
        let store = RecordStore::in_memory();
        store.save(&UserRecord::new_default(UserId(1), store.config()));
        store.save(&UserRecord::new_default(UserId(2), store.config()));
        store.backend().write("user", "3", b"garbage").expect("write");

        let users = store.list_all::<UserRecord>();
        assert_eq!(users.len(), 2);
        assert!(store.list_all::<GroupRecord>().is_empty());
    }

    #[test]
    fn kinds_do_not_share_slots() {
        let store = RecordStore::in_memory();
        store.save(&UserRecord::new_default(UserId(10), store.config()));
        let (_, state) = store.get_or_create::<GroupRecord>(ChatId(10));
        assert!(state.is_created());
    }

    struct FailingBackend;

    impl SlotBackend for FailingBackend {
        fn read(&self, _: &str, _: &str) -> Result<Option<Vec<u8>>> {
            Err(ConfidantError::Io(std::io::Error::other("disk gone")))
        }
        fn write(&self, _: &str, _: &str, _: &[u8]) -> Result<()> {
            Err(ConfidantError::Io(std::io::Error::other("disk gone")))
        }
        fn list(&self, _: &str) -> Result<Vec<(String, Vec<u8>)>> {
            Err(ConfidantError::Io(std::io::Error::other("disk gone")))
        }
        fn remove(&self, _: &str, _: &str) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn failures_are_swallowed_and_counted() {
        let store = RecordStore::new(Arc::new(FailingBackend), RecordsConfig::default());
        let user: UserRecord = store.load(UserId(1));
        store.save(&user);
        assert!(store.try_save(&user).is_err());
        assert!(store.list_all::<UserRecord>().is_empty());
        assert_eq!(store.counters().snapshot().save_failures, 1);
    }

    /// Wraps [`MemorySlots`]; reads or backup writes fail while switched on.
    #[derive(Default)]
    struct Flaky {
        inner: MemorySlots,
        fail_reads: AtomicBool,
        fail_backups: AtomicBool,
    }

    impl SlotBackend for Flaky {
        fn read(&self, namespace: &str, key: &str) -> Result<Option<Vec<u8>>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(ConfidantError::Io(std::io::Error::other("database is locked")));
            }
            self.inner.read(namespace, key)
        }
        fn write(&self, namespace: &str, key: &str, data: &[u8]) -> Result<()> {
            if self.fail_backups.load(Ordering::SeqCst) && namespace.ends_with("_backup") {
                return Err(ConfidantError::Io(std::io::Error::other("disk full")));
            }
            self.inner.write(namespace, key, data)
        }
        fn list(&self, namespace: &str) -> Result<Vec<(String, Vec<u8>)>> {
            self.inner.list(namespace)
        }
        fn remove(&self, namespace: &str, key: &str) -> Result<bool> {
            self.inner.remove(namespace, key)
        }
    }

    fn flaky_store() -> (Arc<Flaky>, RecordStore) {
        let backend = Arc::new(Flaky::default());
        let store = RecordStore::new(backend.clone(), RecordsConfig::default());
        (backend, store)
    }

    #[test]
    fn transient_read_error_is_not_mistaken_for_a_new_record() {
        let (backend, store) = flaky_store();
        let mut user: UserRecord = store.load(UserId(1));
        user.merge_facts([("name".to_string(), "Alex".to_string())]);
        store.save(&user);

        backend.fail_reads.store(true, Ordering::SeqCst);
        let (stand_in, state) = store.get_or_create::<UserRecord>(UserId(1));
        assert_eq!(state, LoadState::ReadFailed);
        assert!(!state.can_save());
        assert!(stand_in.facts.is_empty());
        assert_eq!(store.counters().snapshot().read_failures, 1);
        assert_eq!(store.counters().snapshot().records_created, 1);

        backend.fail_reads.store(false, Ordering::SeqCst);
        let reloaded: UserRecord = store.load(UserId(1));
        assert_eq!(reloaded.facts.get("name").map(String::as_str), Some("Alex"));
    }

    #[tokio::test]
    async fn update_does_not_overwrite_an_unreadable_slot() {
        let (backend, store) = flaky_store();
        store
            .update::<UserRecord, _>(UserId(2), |u| {
                u.merge_facts([("city".to_string(), "Porto".to_string())]);
            })
            .await;

        backend.fail_reads.store(true, Ordering::SeqCst);
        let returned = store
            .update::<UserRecord, _>(UserId(2), |u| {
                u.merge_facts([("pet".to_string(), "cat".to_string())]);
            })
            .await;
        assert_eq!(returned.facts.len(), 1);

        backend.fail_reads.store(false, Ordering::SeqCst);
        let user: UserRecord = store.load(UserId(2));
        assert_eq!(user.facts.get("city").map(String::as_str), Some("Porto"));
        assert!(!user.facts.contains_key("pet"));
    }

    #[test]
    fn corrupt_slot_that_cannot_be_backed_up_stays_in_place() {
        let (backend, store) = flaky_store();
        backend.fail_backups.store(true, Ordering::SeqCst);
        backend.write("user", "4", b"garbage").expect("write");

        let (_, state) = store.get_or_create::<UserRecord>(UserId(4));
        assert_eq!(state, LoadState::ReadFailed);
        assert_eq!(backend.read("user", "4").expect("read").as_deref(), Some(&b"garbage"[..]));
        assert_eq!(store.counters().snapshot().corrupt_slots_recovered, 0);
    }

    #[tokio::test]
    async fn concurrent_updates_are_not_lost() {
        let store = RecordStore::in_memory();
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update::<UserRecord, _>(UserId(1), |u| {
                        u.merge_facts([(format!("k{i}"), i.to_string())]);
                    })
                    .await;
            }));
        }
        for handle in handles {
            handle.await.expect("join");
        }
        let user: UserRecord = store.load(UserId(1));
        assert_eq!(user.facts.len(), 20);
    }
}
