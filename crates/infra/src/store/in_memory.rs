use std::collections::HashMap;
use std::sync::RwLock;

use stockledger_core::ExpectedVersion;
use stockledger_inventory::{InventoryRecord, LedgerEntry, StockKey};

use super::r#trait::{StockChange, StockStore, StoreError, check_successor};

#[derive(Debug, Default)]
struct State {
    records: HashMap<StockKey, InventoryRecord>,
    ledger: Vec<LedgerEntry>,
}

/// In-memory stock store.
///
/// Intended for tests/dev. Records and ledger live behind one lock, so a
/// commit is atomic with respect to every reader and writer.
#[derive(Debug, Default)]
pub struct InMemoryStockStore {
    state: RwLock<State>,
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger entries across all positions.
    pub fn ledger_len(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.ledger.len())
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl StockStore for InMemoryStockStore {
    async fn load_record(&self, key: &StockKey) -> Result<Option<InventoryRecord>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.records.get(key).cloned())
    }

    async fn list_records(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let mut records: Vec<InventoryRecord> = state.records.values().cloned().collect();
        records.sort_by(|a, b| a.key().cmp(b.key()));
        Ok(records)
    }

    async fn load_ledger(&self, key: &StockKey) -> Result<Vec<LedgerEntry>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .ledger
            .iter()
            .filter(|e| e.belongs_to(key))
            .cloned()
            .collect())
    }

    async fn commit(
        &self,
        change: StockChange,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        check_successor(&change, expected)?;

        let mut state = self.state.write().map_err(|_| poisoned())?;

        let current = state
            .records
            .get(change.key())
            .map(|r| r.version())
            .unwrap_or(0);
        if !expected.matches(current) {
            return Err(StoreError::Concurrency(format!(
                "{}: expected {expected:?}, found {current}",
                change.key()
            )));
        }

        let (record, entry) = change.into_parts();
        state.records.insert(record.key().clone(), record);
        state.ledger.push(entry);
        Ok(())
    }
}
