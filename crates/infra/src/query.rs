//! Read projections over the stock store.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::instrument;

use stockledger_inventory::{InventoryRecord, LedgerEntry, StockKey};

use crate::store::{StockStore, StoreError};

/// One row of the inventory snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub product: String,
    pub quantity: i64,
    pub last_updated: String,
    pub warehouse: String,
}

impl From<&InventoryRecord> for SnapshotEntry {
    fn from(record: &InventoryRecord) -> Self {
        Self {
            product: record.product().to_string(),
            quantity: record.quantity(),
            last_updated: record.last_updated().to_string(),
            warehouse: record.warehouse().to_string(),
        }
    }
}

/// Snapshot keyed by display key (`"<product> (<warehouse>)"`).
pub type Snapshot = BTreeMap<String, SnapshotEntry>;

/// Read-only views: the full inventory snapshot and per-position ledger history.
#[derive(Debug)]
pub struct QueryLayer<S> {
    store: S,
}

impl<S> QueryLayer<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> QueryLayer<S>
where
    S: StockStore,
{
    /// Every record, keyed by display key.
    ///
    /// Records are folded in key order, so when two distinct keys render to the
    /// same display key the later one wins, deterministically.
    #[instrument(skip(self), err)]
    pub async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        let mut records = self.store.list_records().await?;
        records.sort_by(|a, b| a.key().cmp(b.key()));

        let mut snapshot = Snapshot::new();
        for record in &records {
            snapshot.insert(record.key().display_key(), SnapshotEntry::from(record));
        }
        Ok(snapshot)
    }

    /// Ledger entries for exactly `key`, ascending by caller-supplied date.
    ///
    /// The sort is byte-wise and stable: entries sharing a date keep the order
    /// the store returned them in.
    #[instrument(skip(self), fields(product = %key.product, warehouse = %key.warehouse), err)]
    pub async fn ledger(&self, key: &StockKey) -> Result<Vec<LedgerEntry>, StoreError> {
        let mut entries = self.store.load_ledger(key).await?;
        entries.retain(|e| e.belongs_to(key));
        entries.sort_by(|a, b| a.date.cmp(&b.date));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mutation::MutationEngine;
    use crate::store::InMemoryStockStore;
    use stockledger_inventory::{Movement, MovementAction, replay_quantity};

    fn movement(
        product: &str,
        warehouse: &str,
        action: MovementAction,
        qty: i64,
        date: &str,
    ) -> Movement {
        Movement::new(StockKey::new(product, warehouse), action, qty, "alice", date, "").unwrap()
    }

    fn setup() -> (MutationEngine<Arc<InMemoryStockStore>>, QueryLayer<Arc<InMemoryStockStore>>) {
        let store = Arc::new(InMemoryStockStore::new());
        (MutationEngine::new(store.clone()), QueryLayer::new(store))
    }

    #[tokio::test]
    async fn ledger_is_sorted_by_date_not_insertion() {
        let (engine, queries) = setup();
        for date in ["2024-03-03", "2024-03-01", "2024-03-02"] {
            engine
                .apply(&movement("Widget", "Main", MovementAction::Add, 1, date))
                .await
                .unwrap();
        }

        let dates: Vec<String> = queries
            .ledger(&StockKey::new("Widget", "Main"))
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec!["2024-03-01", "2024-03-02", "2024-03-03"]);
    }

    #[tokio::test]
    async fn add_then_add_shows_both_entries_in_order() {
        let (engine, queries) = setup();
        let key = StockKey::new("Widget", "Main");
        engine
            .apply(&movement("Widget", "Main", MovementAction::Add, 10, "2024-01-01"))
            .await
            .unwrap();
        engine
            .apply(&movement("Widget", "Main", MovementAction::Add, 5, "2024-01-02"))
            .await
            .unwrap();

        let ledger = queries.ledger(&key).await.unwrap();
        let quantities: Vec<i64> = ledger.iter().map(|e| e.quantity).collect();
        assert_eq!(quantities, vec![10, 5]);

        let snapshot = queries.snapshot().await.unwrap();
        assert_eq!(snapshot["Widget (Main)"].quantity, 15);
    }

    #[tokio::test]
    async fn ledger_for_unknown_key_is_empty() {
        let (_engine, queries) = setup();
        let ledger = queries.ledger(&StockKey::new("Nope", "Nowhere")).await.unwrap();
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn snapshot_reflects_last_movement() {
        let (engine, queries) = setup();
        engine
            .apply(&movement("Widget", "Main", MovementAction::Add, 8, "2024-01-01"))
            .await
            .unwrap();
        engine
            .apply(&movement("Widget", "Main", MovementAction::Take, 3, "2024-01-05"))
            .await
            .unwrap();
        engine
            .apply(&movement("Gear", "Annex", MovementAction::Take, 2, "2024-01-02"))
            .await
            .unwrap();

        let snapshot = queries.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot["Widget (Main)"],
            SnapshotEntry {
                product: "Widget".to_string(),
                quantity: 5,
                last_updated: "2024-01-05".to_string(),
                warehouse: "Main".to_string(),
            }
        );
        assert_eq!(snapshot["Gear (Annex)"].quantity, 0);
    }

    #[tokio::test]
    async fn display_key_collision_keeps_later_key() {
        let (engine, queries) = setup();
        engine
            .apply(&movement("A (B", "C)", MovementAction::Add, 1, "d"))
            .await
            .unwrap();
        engine
            .apply(&movement("A", "B (C", MovementAction::Add, 2, "d"))
            .await
            .unwrap();

        let snapshot = queries.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        // ("A (B", "C)") sorts after ("A", "B (C"), so it is folded last.
        assert_eq!(snapshot["A (B (C))"].quantity, 1);
    }

    #[tokio::test]
    async fn reads_are_idempotent() {
        let (engine, queries) = setup();
        engine
            .apply(&movement("Widget", "Main", MovementAction::Add, 4, "2024-01-01"))
            .await
            .unwrap();
        engine
            .apply(&movement("Widget", "Main", MovementAction::Take, 1, "2024-01-01"))
            .await
            .unwrap();

        let key = StockKey::new("Widget", "Main");
        assert_eq!(queries.snapshot().await.unwrap(), queries.snapshot().await.unwrap());
        assert_eq!(queries.ledger(&key).await.unwrap(), queries.ledger(&key).await.unwrap());
    }

    #[tokio::test]
    async fn snapshot_matches_ledger_replay() {
        let (engine, queries) = setup();
        let moves = [
            (MovementAction::Add, 3),
            (MovementAction::Take, 10),
            (MovementAction::Add, 7),
            (MovementAction::Take, 2),
        ];
        for (i, (action, qty)) in moves.into_iter().enumerate() {
            let date = format!("2024-02-{:02}", i + 1);
            engine.apply(&movement("Widget", "Main", action, qty, &date)).await.unwrap();
        }

        let ledger = queries.ledger(&StockKey::new("Widget", "Main")).await.unwrap();
        let snapshot = queries.snapshot().await.unwrap();
        assert_eq!(snapshot["Widget (Main)"].quantity, replay_quantity(&ledger));
        assert_eq!(replay_quantity(&ledger), 5);
    }
}
