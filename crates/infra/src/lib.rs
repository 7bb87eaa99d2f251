//! Infrastructure layer: storage backends, the mutation engine, read queries, config.

pub mod config;
pub mod mutation;
pub mod query;
pub mod store;

pub use config::{AppConfig, ConfigError, StorageConfig};
pub use mutation::{MovementError, MovementReceipt, MutationEngine};
pub use query::{QueryLayer, Snapshot, SnapshotEntry};
pub use store::{InMemoryStockStore, PostgresStockStore, StockChange, StockStore, StoreError};
