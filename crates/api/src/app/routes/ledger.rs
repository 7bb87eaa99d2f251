use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub async fn get_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::LedgerQuery>,
) -> axum::response::Response {
    let key = query.key();
    match services.queries().ledger(&key).await {
        Ok(entries) => {
            let items = entries
                .into_iter()
                .map(dto::ledger_entry_to_json)
                .collect::<Vec<_>>();
            (StatusCode::OK, Json(items)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, %key, "failed to fetch ledger");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch ledger",
                "storage failure",
            )
        }
    }
}
