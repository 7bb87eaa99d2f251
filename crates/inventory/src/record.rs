use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult};

/// Composite identity of a stock position: one product in one warehouse.
///
/// Ordered by product, then warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub product: String,
    pub warehouse: String,
}

impl StockKey {
    pub fn new(product: impl Into<String>, warehouse: impl Into<String>) -> Self {
        Self {
            product: product.into(),
            warehouse: warehouse.into(),
        }
    }

    /// Human-facing key used by the snapshot view: `"<product> (<warehouse>)"`.
    ///
    /// Not injective: distinct keys can render to the same text.
    pub fn display_key(&self) -> String {
        format!("{} ({})", self.product, self.warehouse)
    }
}

impl core::fmt::Display for StockKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} ({})", self.product, self.warehouse)
    }
}

/// Current quantity of one stock position.
///
/// A materialized fold over the ledger entries for `key`. The quantity never
/// drops below zero, and `version` counts the movements folded in so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    key: StockKey,
    quantity: i64,
    last_updated: String,
    version: u64,
}

impl InventoryRecord {
    /// Rebuild a record loaded from storage, re-checking its invariants.
    pub fn restore(
        key: StockKey,
        quantity: i64,
        last_updated: impl Into<String>,
        version: u64,
    ) -> DomainResult<Self> {
        if quantity < 0 {
            return Err(DomainError::invariant(format!(
                "stored quantity for {key} is negative ({quantity})"
            )));
        }
        if version == 0 {
            return Err(DomainError::invariant(format!(
                "stored record for {key} has version 0"
            )));
        }
        Ok(Self {
            key,
            quantity,
            last_updated: last_updated.into(),
            version,
        })
    }

    /// Record state after the first movement on a position.
    pub(crate) fn first(key: StockKey, quantity: i64, last_updated: String) -> Self {
        Self {
            key,
            quantity,
            last_updated,
            version: 1,
        }
    }

    /// Record state after one more movement.
    pub(crate) fn advanced(&self, quantity: i64, last_updated: String) -> Self {
        Self {
            key: self.key.clone(),
            quantity,
            last_updated,
            version: self.version + 1,
        }
    }

    pub fn key(&self) -> &StockKey {
        &self.key
    }

    pub fn product(&self) -> &str {
        &self.key.product
    }

    pub fn warehouse(&self) -> &str {
        &self.key.warehouse
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    /// Caller-supplied date of the last movement applied.
    pub fn last_updated(&self) -> &str {
        &self.last_updated
    }

    pub fn version(&self) -> u64 {
        self.version
    }
}
