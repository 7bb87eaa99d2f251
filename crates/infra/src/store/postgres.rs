//! Postgres-backed stock store.
//!
//! Two tables: `inventory` (one row per product + warehouse) and
//! `stock_ledger` (append-only). A commit writes both inside one transaction,
//! so a failed ledger insert also discards the inventory write.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Concurrency` | Two first movements raced on the same key |
//! | Database (check constraint violation) | `23514` | `InvalidChange` | Negative quantity or unknown action reached the database |
//! | Database (other) | Any other | `Backend` | Other database errors |
//! | PoolClosed / Io / other | N/A | `Backend` | Connection failures |

use std::sync::Arc;

use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use stockledger_core::{DomainError, EntryId, ExpectedVersion};
use stockledger_inventory::{InventoryRecord, LedgerEntry, MovementAction, StockKey};

use super::r#trait::{StockChange, StockStore, StoreError, check_successor};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS inventory (
        product      TEXT   NOT NULL,
        warehouse    TEXT   NOT NULL,
        quantity     BIGINT NOT NULL CHECK (quantity >= 0),
        last_updated TEXT   NOT NULL,
        version      BIGINT NOT NULL CHECK (version > 0),
        PRIMARY KEY (product, warehouse)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_ledger (
        id          UUID        PRIMARY KEY,
        product     TEXT        NOT NULL,
        warehouse   TEXT        NOT NULL,
        action      TEXT        NOT NULL CHECK (action IN ('add', 'take')),
        quantity    BIGINT      NOT NULL CHECK (quantity > 0),
        user_name   TEXT        NOT NULL,
        entry_date  TEXT        NOT NULL,
        remarks     TEXT        NOT NULL DEFAULT '',
        recorded_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS stock_ledger_key_date_idx
        ON stock_ledger (product, warehouse, entry_date COLLATE "C")
    "#,
];

/// Postgres-backed stock store.
///
/// ## Thread Safety
///
/// Uses the SQLx connection pool, which is `Send + Sync`; the store can be
/// shared across request handlers behind an `Arc`.
///
/// ## Optimistic Concurrency
///
/// `commit()` guards the inventory write with the version the caller read:
/// - `NoRecord`: `INSERT ... ON CONFLICT DO NOTHING`; zero rows means someone
///   else created the record first
/// - `Exact(v)`: `UPDATE ... WHERE version = v`; zero rows means the record moved on
///
/// Either case rolls back and returns `StoreError::Concurrency`.
#[derive(Debug, Clone)]
pub struct PostgresStockStore {
    pool: Arc<PgPool>,
}

impl PostgresStockStore {
    /// Create a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(product = %key.product, warehouse = %key.warehouse), err)]
    pub async fn fetch_record(
        &self,
        key: &StockKey,
    ) -> Result<Option<InventoryRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT product, warehouse, quantity, last_updated, version
            FROM inventory
            WHERE product = $1 AND warehouse = $2
            "#,
        )
        .bind(&key.product)
        .bind(&key.warehouse)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_record", e))?;

        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip(self), fields(record_count = tracing::field::Empty), err)]
    pub async fn fetch_records(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        let span = Span::current();

        let rows = sqlx::query(
            r#"
            SELECT product, warehouse, quantity, last_updated, version
            FROM inventory
            ORDER BY product COLLATE "C" ASC, warehouse COLLATE "C" ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_records", e))?;

        span.record("record_count", rows.len());
        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self), fields(product = %key.product, warehouse = %key.warehouse), err)]
    pub async fn fetch_ledger(&self, key: &StockKey) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product, warehouse, action, quantity, user_name, entry_date, remarks, recorded_at
            FROM stock_ledger
            WHERE product = $1 AND warehouse = $2
            ORDER BY entry_date COLLATE "C" ASC, id ASC
            "#,
        )
        .bind(&key.product)
        .bind(&key.warehouse)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_ledger", e))?;

        rows.iter().map(entry_from_row).collect()
    }

    /// Write the record and append the entry in one transaction.
    #[instrument(
        skip(self, change),
        fields(
            product = %change.key().product,
            warehouse = %change.key().warehouse,
            expected_version = ?expected
        ),
        err
    )]
    pub async fn commit_change(
        &self,
        change: StockChange,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        check_successor(&change, expected)?;
        let (record, entry) = change.into_parts();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let write = match expected {
            ExpectedVersion::NoRecord => sqlx::query(
                r#"
                INSERT INTO inventory (product, warehouse, quantity, last_updated, version)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (product, warehouse) DO NOTHING
                "#,
            )
            .bind(record.product())
            .bind(record.warehouse())
            .bind(record.quantity())
            .bind(record.last_updated())
            .bind(record.version() as i64)
            .execute(&mut *tx)
            .await,
            ExpectedVersion::Exact(v) => sqlx::query(
                r#"
                UPDATE inventory
                SET quantity = $3, last_updated = $4, version = $5
                WHERE product = $1 AND warehouse = $2 AND version = $6
                "#,
            )
            .bind(record.product())
            .bind(record.warehouse())
            .bind(record.quantity())
            .bind(record.last_updated())
            .bind(record.version() as i64)
            .bind(v as i64)
            .execute(&mut *tx)
            .await,
        }
        .map_err(|e| map_sqlx_error("write_inventory", e))?;

        if write.rows_affected() == 0 {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(StoreError::Concurrency(format!(
                "{}: record changed since it was read (expected {expected:?})",
                record.key()
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO stock_ledger (
                id, product, warehouse, action, quantity, user_name, entry_date, remarks, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(&entry.product)
        .bind(&entry.warehouse)
        .bind(entry.action.as_str())
        .bind(entry.quantity)
        .bind(&entry.user)
        .bind(&entry.date)
        .bind(&entry.remarks)
        .bind(entry.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("append_ledger", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl StockStore for PostgresStockStore {
    async fn load_record(&self, key: &StockKey) -> Result<Option<InventoryRecord>, StoreError> {
        self.fetch_record(key).await
    }

    async fn list_records(&self) -> Result<Vec<InventoryRecord>, StoreError> {
        self.fetch_records().await
    }

    async fn load_ledger(&self, key: &StockKey) -> Result<Vec<LedgerEntry>, StoreError> {
        self.fetch_ledger(key).await
    }

    async fn commit(
        &self,
        change: StockChange,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        self.commit_change(change, expected).await
    }
}

fn decode<T>(row: &PgRow, column: &str) -> Result<T, StoreError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<T, _>(column)
        .map_err(|e| StoreError::Corrupt(format!("failed to read column {column}: {e}")))
}

fn record_from_row(row: &PgRow) -> Result<InventoryRecord, StoreError> {
    let key = StockKey::new(decode::<String>(row, "product")?, decode::<String>(row, "warehouse")?);
    let version = decode::<i64>(row, "version")?;
    let version = u64::try_from(version)
        .map_err(|_| StoreError::Corrupt(format!("negative version {version} for {key}")))?;

    InventoryRecord::restore(
        key,
        decode::<i64>(row, "quantity")?,
        decode::<String>(row, "last_updated")?,
        version,
    )
    .map_err(|e| StoreError::Corrupt(e.to_string()))
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, StoreError> {
    let action: MovementAction = decode::<String>(row, "action")?
        .parse()
        .map_err(|e: DomainError| StoreError::Corrupt(e.to_string()))?;

    Ok(LedgerEntry {
        id: EntryId::from_uuid(decode::<uuid::Uuid>(row, "id")?),
        product: decode(row, "product")?,
        warehouse: decode(row, "warehouse")?,
        action,
        quantity: decode(row, "quantity")?,
        user: decode(row, "user_name")?,
        date: decode(row, "entry_date")?,
        remarks: decode(row, "remarks")?,
        recorded_at: decode(row, "recorded_at")?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation: a concurrent first insert won.
                Some("23505") => StoreError::Concurrency(msg),
                Some("23514") => StoreError::InvalidChange(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    //! Run against a live database: `DATABASE_URL=postgres://... cargo test`.
    //! Each test skips itself when `DATABASE_URL` is unset.

    use std::sync::Arc;

    use chrono::Utc;
    use stockledger_inventory::Movement;
    use tokio::sync::OnceCell;

    use super::*;
    use crate::mutation::MutationEngine;

    static SCHEMA_READY: OnceCell<()> = OnceCell::const_new();

    async fn test_store() -> Option<PostgresStockStore> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping postgres test");
            return None;
        };
        let store = PostgresStockStore::connect(&url, 8).await.unwrap();
        SCHEMA_READY
            .get_or_init(|| async { store.ensure_schema().await.unwrap() })
            .await;
        Some(store)
    }

    /// Fresh position per test so runs never see each other's rows.
    fn unique_key() -> StockKey {
        StockKey::new(format!("widget-{}", uuid::Uuid::now_v7()), "Main")
    }

    fn change(
        key: &StockKey,
        current: Option<&InventoryRecord>,
        quantity: i64,
        date: &str,
        id: EntryId,
    ) -> StockChange {
        let m =
            Movement::new(key.clone(), MovementAction::Add, quantity, "alice", date, "").unwrap();
        let record = m.apply_to(current).unwrap();
        StockChange::new(record, m.to_ledger_entry(id, Utc::now())).unwrap()
    }

    #[tokio::test]
    async fn first_insert_race_loser_writes_nothing() {
        let Some(store) = test_store().await else { return };
        let key = unique_key();

        let first = change(&key, None, 10, "2024-01-01", EntryId::new());
        store.commit(first, ExpectedVersion::NoRecord).await.unwrap();

        // A second writer that also saw no record.
        let late = change(&key, None, 5, "2024-01-02", EntryId::new());
        let err = store.commit(late, ExpectedVersion::NoRecord).await.unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        let rec = store.load_record(&key).await.unwrap().unwrap();
        assert_eq!(rec.quantity(), 10);
        assert_eq!(rec.version(), 1);
        assert_eq!(store.load_ledger(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_version_update_writes_neither_table() {
        let Some(store) = test_store().await else { return };
        let key = unique_key();

        let first = change(&key, None, 10, "2024-01-01", EntryId::new());
        store.commit(first, ExpectedVersion::NoRecord).await.unwrap();
        let v1 = store.load_record(&key).await.unwrap().unwrap();

        let second = change(&key, Some(&v1), 5, "2024-01-02", EntryId::new());
        store.commit(second, ExpectedVersion::Exact(1)).await.unwrap();

        // Computed from the version-1 record, which has moved on.
        let stale = change(&key, Some(&v1), 7, "2024-01-03", EntryId::new());
        let err = store.commit(stale, ExpectedVersion::Exact(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Concurrency(_)));

        let rec = store.load_record(&key).await.unwrap().unwrap();
        assert_eq!(rec.quantity(), 15);
        assert_eq!(rec.version(), 2);
        assert_eq!(rec.last_updated(), "2024-01-02");
        assert_eq!(store.load_ledger(&key).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn failed_ledger_append_rolls_back_inventory_write() {
        let Some(store) = test_store().await else { return };
        let key = unique_key();
        let reused_id = EntryId::new();

        let first = change(&key, None, 10, "2024-01-01", reused_id);
        store.commit(first, ExpectedVersion::NoRecord).await.unwrap();
        let v1 = store.load_record(&key).await.unwrap().unwrap();

        // The inventory UPDATE succeeds, then the ledger INSERT hits the primary key.
        let clash = change(&key, Some(&v1), 5, "2024-01-02", reused_id);
        assert!(store.commit(clash, ExpectedVersion::Exact(1)).await.is_err());

        let rec = store.load_record(&key).await.unwrap().unwrap();
        assert_eq!(rec, v1);
        assert_eq!(store.load_ledger(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ledger_comes_back_in_date_order() {
        let Some(store) = test_store().await else { return };
        let key = unique_key();

        let mut current = None;
        for date in ["2024-01-03", "2024-01-01", "2024-01-02"] {
            let expected =
                ExpectedVersion::observed(current.as_ref().map(InventoryRecord::version));
            let c = change(&key, current.as_ref(), 1, date, EntryId::new());
            store.commit(c, expected).await.unwrap();
            current = store.load_record(&key).await.unwrap();
        }

        let dates: Vec<String> = store
            .load_ledger(&key)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec!["2024-01-01", "2024-01-02", "2024-01-03"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_adds_on_one_position_all_land() {
        let Some(store) = test_store().await else { return };
        let key = unique_key();
        let engine = Arc::new(MutationEngine::new(store.clone()));

        let writers = 24;
        let mut handles = Vec::new();
        for i in 0..writers {
            let engine = engine.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move {
                let m = Movement::new(key, MovementAction::Add, 1, "alice", format!("d{i:02}"), "")
                    .unwrap();
                engine.apply(&m).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let rec = store.load_record(&key).await.unwrap().unwrap();
        assert_eq!(rec.quantity(), writers);
        assert_eq!(rec.version(), writers as u64);
        assert_eq!(store.load_ledger(&key).await.unwrap().len(), writers as usize);
    }
}
