//! Key-value store seam.

use async_trait::async_trait;
use thiserror::Error;

use crate::record::{PersistedAccountRecord, RecordPatch, WriteCondition};

/// Store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// More than one record exists for the key. A store invariant
    /// violation: terminal for the message, audited as a data anomaly.
    #[error("more than one record found for account")]
    TooManyRecords,
    /// The optimistic write condition did not hold.
    #[error("write condition failed")]
    ConditionFailed,
    /// Transport or service trouble; retryable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable per-account record storage.
///
/// `fetch` returning `None` is the ordinary first-contact case and is not an
/// error; the processor applies the default-okay interpretation at exactly
/// one call site.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn fetch(&self, account_id: &str) -> Result<Option<PersistedAccountRecord>, StoreError>;

    async fn apply_patch(
        &self,
        account_id: &str,
        patch: &RecordPatch,
        condition: &WriteCondition,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: AccountStore + ?Sized> AccountStore for std::sync::Arc<T> {
    async fn fetch(&self, account_id: &str) -> Result<Option<PersistedAccountRecord>, StoreError> {
        (**self).fetch(account_id).await
    }

    async fn apply_patch(
        &self,
        account_id: &str,
        patch: &RecordPatch,
        condition: &WriteCondition,
    ) -> Result<(), StoreError> {
        (**self).apply_patch(account_id, patch, condition).await
    }
}
