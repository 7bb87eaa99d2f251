use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use stockledger_inventory::MovementRequest;

use crate::app::errors;
use crate::app::services::AppServices;

pub async fn get_snapshot(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.queries().snapshot().await {
        Ok(snapshot) => (StatusCode::OK, Json(snapshot)).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to fetch inventory snapshot");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch inventory",
                "storage failure",
            )
        }
    }
}

pub async fn apply_movement(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<MovementRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(b) => b,
        Err(rejection) => {
            let message = rejection.body_text();
            return errors::json_error(StatusCode::BAD_REQUEST, "Invalid input", message);
        }
    };

    match services.engine().apply_movement(&request).await {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "success": true }))).into_response(),
        Err(e) => errors::movement_error_to_response(e),
    }
}
