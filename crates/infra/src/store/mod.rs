//! Stock storage boundary.
//!
//! One trait covers both the inventory records and the append-only ledger,
//! because the two are only ever written together.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryStockStore;
pub use postgres::PostgresStockStore;
pub use r#trait::{StockChange, StockStore, StoreError};
