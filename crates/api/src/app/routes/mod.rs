use axum::{
    Router,
    routing::{get, post},
};

pub mod inventory;
pub mod ledger;
pub mod system;

/// Router for the stock endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/data", get(inventory::get_snapshot))
        .route("/update", post(inventory::apply_movement))
        .route("/ledger", get(ledger::get_ledger))
}
