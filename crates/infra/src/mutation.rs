//! Stock movement pipeline (the only write path).
//!
//! ```text
//! MovementRequest
//!   ↓
//! 1. Validate (all-or-nothing, before any store access)
//!   ↓
//! 2. Load current record for (product, warehouse)
//!   ↓
//! 3. Decide next record state (add / take, floored at zero)
//!   ↓
//! 4. Commit record + ledger entry atomically, guarded by the version read in 2
//!   ↓
//! 5. On a version conflict, go back to 2
//! ```
//!
//! Concurrent movements on the same position therefore never lose an update:
//! the loser of a race re-reads and re-applies on top of the winner. A
//! conflict means another movement on the same position committed, so every
//! round lands at least one writer and each valid movement eventually lands.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use stockledger_core::{DomainError, EntryId, ExpectedVersion};
use stockledger_inventory::{InventoryRecord, LedgerEntry, Movement, MovementRequest};

use crate::store::{StockChange, StockStore, StoreError};

#[derive(Debug, Error)]
pub enum MovementError {
    /// Malformed, missing or out-of-range input. Nothing was written.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The store failed or returned inconsistent data.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
}

impl From<DomainError> for MovementError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => MovementError::Validation(msg),
            // Only reachable when the store hands back a record for another key.
            DomainError::InvariantViolation(msg) => {
                MovementError::Storage(StoreError::Corrupt(msg))
            }
        }
    }
}

/// Acknowledgement of an applied movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementReceipt {
    pub record: InventoryRecord,
    pub entry: LedgerEntry,
    /// How many commit attempts it took (1 when uncontended).
    pub attempts: u32,
}

/// Applies stock movements against a [`StockStore`].
///
/// Owns the write path to both the inventory records and the ledger.
#[derive(Debug)]
pub struct MutationEngine<S> {
    store: S,
}

impl<S> MutationEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> MutationEngine<S>
where
    S: StockStore,
{
    /// Validate a loosely-typed request and apply it.
    pub async fn apply_movement(
        &self,
        request: &MovementRequest,
    ) -> Result<MovementReceipt, MovementError> {
        let movement = request.validate()?;
        self.apply(&movement).await
    }

    /// Apply an already validated movement.
    ///
    /// Version conflicts are retried until the commit lands; any other store
    /// error is returned as is.
    #[instrument(
        skip(self, movement),
        fields(
            product = %movement.key().product,
            warehouse = %movement.key().warehouse,
            action = %movement.action(),
            quantity = movement.quantity()
        ),
        err
    )]
    pub async fn apply(&self, movement: &Movement) -> Result<MovementReceipt, MovementError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let current = self.store.load_record(movement.key()).await?;
            let expected = ExpectedVersion::observed(current.as_ref().map(|r| r.version()));

            let record = movement.apply_to(current.as_ref())?;
            let entry = movement.to_ledger_entry(EntryId::new(), Utc::now());
            let change = StockChange::new(record.clone(), entry.clone())?;

            match self.store.commit(change, expected).await {
                Ok(()) => {
                    info!(
                        entry_id = %entry.id,
                        new_quantity = record.quantity(),
                        version = record.version(),
                        attempts = attempt,
                        "stock movement applied"
                    );
                    return Ok(MovementReceipt {
                        record,
                        entry,
                        attempts: attempt,
                    });
                }
                Err(StoreError::Concurrency(msg)) => {
                    warn!(attempt, %msg, "stock record changed concurrently; retrying");
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}
