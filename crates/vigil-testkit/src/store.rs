//! In-memory account store for testing.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use vigil_core::effects::{AccountStore, StoreError};
use vigil_core::record::{PersistedAccountRecord, RecordPatch, WriteCondition};

/// In-memory store with scriptable failures.
///
/// Writes apply the patch's canonical semantics to a loaded (or fresh)
/// record after checking the optimistic condition, mirroring what a real
/// adapter does with native partial updates.
#[derive(Default)]
pub struct MemoryAccountStore {
    records: Mutex<HashMap<String, PersistedAccountRecord>>,
    failing_writes: Mutex<HashSet<String>>,
    duplicate_accounts: Mutex<HashSet<String>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a stored record.
    pub fn insert_record(&self, account_id: &str, record: PersistedAccountRecord) {
        self.records.lock().insert(account_id.to_string(), record);
    }

    /// Current record, if any.
    pub fn record(&self, account_id: &str) -> Option<PersistedAccountRecord> {
        self.records.lock().get(account_id).cloned()
    }

    /// Make every write for this account fail as unavailable.
    pub fn fail_writes_for(&self, account_id: &str) {
        self.failing_writes.lock().insert(account_id.to_string());
    }

    /// Stop failing writes for this account.
    pub fn heal_writes_for(&self, account_id: &str) {
        self.failing_writes.lock().remove(account_id);
    }

    /// Make reads for this account report the duplicate-record anomaly.
    pub fn mark_duplicate(&self, account_id: &str) {
        self.duplicate_accounts.lock().insert(account_id.to_string());
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn fetch(&self, account_id: &str) -> Result<Option<PersistedAccountRecord>, StoreError> {
        if self.duplicate_accounts.lock().contains(account_id) {
            return Err(StoreError::TooManyRecords);
        }
        Ok(self.records.lock().get(account_id).cloned())
    }

    async fn apply_patch(
        &self,
        account_id: &str,
        patch: &RecordPatch,
        condition: &WriteCondition,
    ) -> Result<(), StoreError> {
        if self.failing_writes.lock().contains(account_id) {
            return Err(StoreError::Unavailable("scripted write failure".to_string()));
        }
        let mut records = self.records.lock();
        let existing = records.get(account_id);
        if let WriteCondition::AppliedAtUnchanged(expected) = condition {
            let actual = existing.and_then(|record| record.applied_at);
            if actual != *expected {
                return Err(StoreError::ConditionFailed);
            }
        }
        let mut record = existing.cloned().unwrap_or_default();
        patch.apply_to(&mut record);
        records.insert(account_id.to_string(), record);
        Ok(())
    }
}
