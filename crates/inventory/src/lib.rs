//! Inventory domain module.
//!
//! This crate contains the stock movement rules, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage).

pub mod ledger;
pub mod movement;
pub mod record;

pub use ledger::{LedgerEntry, MovementAction, replay_quantity};
pub use movement::{Movement, MovementRequest, QuantityInput};
pub use record::{InventoryRecord, StockKey};
