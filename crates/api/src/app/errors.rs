use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_infra::MovementError;

pub fn movement_error_to_response(err: MovementError) -> axum::response::Response {
    match err {
        MovementError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "Invalid input", msg),
        MovementError::Storage(e) => {
            tracing::error!(error = %e, "stock movement failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update inventory",
                "storage failure",
            )
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
