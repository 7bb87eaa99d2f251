use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, EntryId};

use crate::record::StockKey;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementAction {
    Add,
    Take,
}

impl MovementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementAction::Add => "add",
            MovementAction::Take => "take",
        }
    }

    /// Quantity after moving `quantity` units from/to `current`.
    ///
    /// Takes floor at zero instead of failing; adds saturate at `i64::MAX`.
    pub fn apply(self, current: i64, quantity: i64) -> i64 {
        match self {
            MovementAction::Add => current.saturating_add(quantity),
            MovementAction::Take => current.saturating_sub(quantity).max(0),
        }
    }
}

impl core::fmt::Display for MovementAction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for MovementAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(MovementAction::Add),
            "take" => Ok(MovementAction::Take),
            other => Err(DomainError::validation(format!(
                "action must be one of: add, take (got '{other}')"
            ))),
        }
    }
}

/// One accepted stock movement (immutable, append-only).
///
/// `quantity` is the requested magnitude, not the resulting total: a `take`
/// that was floored at zero still records what was asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub product: String,
    pub warehouse: String,
    pub action: MovementAction,
    pub quantity: i64,
    pub user: String,
    /// Caller-supplied date; defines ordering within a stock position.
    pub date: String,
    pub remarks: String,
    /// Server clock at the time the entry was written (audit only).
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product.clone(), self.warehouse.clone())
    }

    pub fn belongs_to(&self, key: &StockKey) -> bool {
        self.product == key.product && self.warehouse == key.warehouse
    }
}

/// Replay entries (in commit order) into the quantity they imply.
///
/// This is the same fold the mutation path maintains incrementally, so for
/// a consistent store `replay_quantity(entries) == record.quantity()`.
pub fn replay_quantity<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> i64 {
    entries
        .into_iter()
        .fold(0, |qty, e| e.action.apply(qty, e.quantity))
}
