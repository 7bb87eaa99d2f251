use std::sync::Arc;

use thiserror::Error;

use stockledger_core::ExpectedVersion;
use stockledger_inventory::{InventoryRecord, LedgerEntry, StockKey};

/// One accepted movement, ready to be committed: the next record state plus
/// the ledger entry that explains it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    record: InventoryRecord,
    entry: LedgerEntry,
}

impl StockChange {
    /// Pair a record with its ledger entry. Both must refer to the same stock position.
    pub fn new(record: InventoryRecord, entry: LedgerEntry) -> Result<Self, StoreError> {
        if !entry.belongs_to(record.key()) {
            return Err(StoreError::InvalidChange(format!(
                "ledger entry for {} does not match record {}",
                entry.key(),
                record.key()
            )));
        }
        Ok(Self { record, entry })
    }

    pub fn record(&self) -> &InventoryRecord {
        &self.record
    }

    pub fn key(&self) -> &StockKey {
        self.record.key()
    }

    pub fn into_parts(self) -> (InventoryRecord, LedgerEntry) {
        (self.record, self.entry)
    }
}

/// Stock store operation error.
///
/// These are **infrastructure errors**; input validation never reaches the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record changed between read and commit (version mismatch).
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// The change itself is malformed (e.g. record and entry disagree on key).
    #[error("invalid change: {0}")]
    InvalidChange(String),

    /// Stored data violates a domain invariant.
    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    /// The backend is unreachable or the operation failed.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Reject commits whose record version does not follow the expected one.
pub(crate) fn check_successor(
    change: &StockChange,
    expected: ExpectedVersion,
) -> Result<(), StoreError> {
    if change.record().version() != expected.successor() {
        return Err(StoreError::InvalidChange(format!(
            "record version {} does not follow expected {expected:?}",
            change.record().version()
        )));
    }
    Ok(())
}

/// Backing store for inventory records and the stock ledger.
///
/// ## Commit Semantics
///
/// `commit()` is the only write. It upserts the record and appends the ledger
/// entry as one unit, and only if the stored version of the record still
/// matches `expected` (`NoRecord` for a first movement). On mismatch it
/// writes nothing and returns `StoreError::Concurrency`. Callers re-read and
/// retry.
///
/// The ledger is append-only: nothing in this trait updates or deletes entries.
#[async_trait::async_trait]
pub trait StockStore: Send + Sync {
    /// Current record for one stock position, if any movement touched it.
    async fn load_record(&self, key: &StockKey) -> Result<Option<InventoryRecord>, StoreError>;

    /// All records, ordered by key.
    async fn list_records(&self) -> Result<Vec<InventoryRecord>, StoreError>;

    /// Ledger entries for one stock position. No ordering guarantee.
    async fn load_ledger(&self, key: &StockKey) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Atomically write the record and append its ledger entry.
    async fn commit(
        &self,
        change: StockChange,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> StockStore for Arc<S>
where
    S: StockStore + ?Sized,
{
    async fn load_record(&self, key: &StockKey) -> Result<Option<InventoryRecord>, StoreError> {
        (**self).load_record(key).await
    }

    async fn list_records(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        (**self).list_records().await
    }

    async fn load_ledger(&self, key: &StockKey) -> Result<Vec<LedgerEntry>, StoreError> {
        (**self).load_ledger(key).await
    }

    async fn commit(
        &self,
        change: StockChange,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        (**self).commit(change, expected).await
    }
}
