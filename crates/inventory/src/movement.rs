use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, DomainResult, EntryId};

use crate::ledger::{LedgerEntry, MovementAction};
use crate::record::{InventoryRecord, StockKey};

/// Quantity as it arrives over the wire: a JSON integer or a numeric string.
///
/// Anything else is kept verbatim so validation can reject it with a proper
/// message instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuantityInput {
    Integer(i64),
    Text(String),
    Other(serde_json::Value),
}

impl QuantityInput {
    fn parse_positive(&self) -> DomainResult<i64> {
        let value = match self {
            QuantityInput::Integer(n) => *n,
            QuantityInput::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                DomainError::validation(format!("quantity must be an integer (got '{s}')"))
            })?,
            QuantityInput::Other(v) => {
                return Err(DomainError::validation(format!(
                    "quantity must be an integer (got {v})"
                )));
            }
        };

        if value <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be greater than zero (got {value})"
            )));
        }
        Ok(value)
    }
}

/// Loosely-typed movement request, as deserialized by the transport layer.
///
/// Every field is optional here; `validate()` is the only way to turn it into
/// a [`Movement`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub product: Option<String>,
    pub user: Option<String>,
    pub date: Option<String>,
    pub action: Option<String>,
    pub quantity: Option<QuantityInput>,
    pub warehouse: Option<String>,
    pub remarks: Option<String>,
}

impl MovementRequest {
    /// Validate all fields (all-or-nothing). The error names the first offending field.
    pub fn validate(&self) -> DomainResult<Movement> {
        let product = required("product", &self.product)?;
        let user = required("user", &self.user)?;
        let date = required("date", &self.date)?;
        let action: MovementAction = required("action", &self.action)?.parse()?;
        let warehouse = required("warehouse", &self.warehouse)?;
        let quantity = self
            .quantity
            .as_ref()
            .ok_or_else(|| DomainError::validation("quantity is required"))?
            .parse_positive()?;

        Ok(Movement {
            key: StockKey::new(product, warehouse),
            action,
            quantity,
            user: user.to_string(),
            date: date.to_string(),
            remarks: self.remarks.clone().unwrap_or_default(),
        })
    }
}

fn required<'a>(field: &str, value: &'a Option<String>) -> DomainResult<&'a str> {
    match value.as_deref() {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(DomainError::validation(format!("{field} is required"))),
    }
}

/// A validated stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    key: StockKey,
    action: MovementAction,
    quantity: i64,
    user: String,
    date: String,
    remarks: String,
}

impl Movement {
    /// Typed constructor; applies the same checks as [`MovementRequest::validate`].
    pub fn new(
        key: StockKey,
        action: MovementAction,
        quantity: i64,
        user: impl Into<String>,
        date: impl Into<String>,
        remarks: impl Into<String>,
    ) -> DomainResult<Self> {
        MovementRequest {
            product: Some(key.product),
            user: Some(user.into()),
            date: Some(date.into()),
            action: Some(action.as_str().to_string()),
            quantity: Some(QuantityInput::Integer(quantity)),
            warehouse: Some(key.warehouse),
            remarks: Some(remarks.into()),
        }
        .validate()
    }

    pub fn key(&self) -> &StockKey {
        &self.key
    }

    pub fn action(&self) -> MovementAction {
        self.action
    }

    /// Requested magnitude (always > 0).
    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn remarks(&self) -> &str {
        &self.remarks
    }

    /// Next record state for this movement's position.
    ///
    /// - existing record: add/take against its quantity, floored at zero
    /// - no record: `add` starts at the requested quantity, `take` starts at zero
    ///
    /// `last_updated` always becomes the movement's date.
    pub fn apply_to(&self, current: Option<&InventoryRecord>) -> DomainResult<InventoryRecord> {
        match current {
            Some(record) => {
                if record.key() != &self.key {
                    return Err(DomainError::invariant(format!(
                        "movement for {} applied to record {}",
                        self.key,
                        record.key()
                    )));
                }
                let quantity = self.action.apply(record.quantity(), self.quantity);
                Ok(record.advanced(quantity, self.date.clone()))
            }
            None => {
                let quantity = self.action.apply(0, self.quantity);
                Ok(InventoryRecord::first(self.key.clone(), quantity, self.date.clone()))
            }
        }
    }

    /// Ledger entry recording this movement.
    pub fn to_ledger_entry(&self, id: EntryId, recorded_at: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id,
            product: self.key.product.clone(),
            warehouse: self.key.warehouse.clone(),
            action: self.action,
            quantity: self.quantity,
            user: self.user.clone(),
            date: self.date.clone(),
            remarks: self.remarks.clone(),
            recorded_at,
        }
    }
}
