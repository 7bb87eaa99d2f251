use serde::Deserialize;
use serde_json::json;

use stockledger_inventory::{LedgerEntry, StockKey};

// -------------------------
// Request DTOs
// -------------------------

/// `GET /ledger?product=&warehouse=`; absent parameters match nothing.
#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub product: Option<String>,
    pub warehouse: Option<String>,
}

impl LedgerQuery {
    pub fn key(self) -> StockKey {
        StockKey::new(self.product.unwrap_or_default(), self.warehouse.unwrap_or_default())
    }
}

// -------------------------
// Response mapping
// -------------------------

pub fn ledger_entry_to_json(e: LedgerEntry) -> serde_json::Value {
    json!({
        "id": e.id.to_string(),
        "product": e.product,
        "warehouse": e.warehouse,
        "action": e.action.as_str(),
        "quantity": e.quantity,
        "user": e.user,
        "date": e.date,
        "remarks": e.remarks,
        "recordedAt": e.recorded_at.to_rfc3339(),
    })
}
