use axum::{http::StatusCode, response::Json};
use serde_json::Value;

pub(super) async fn health() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "UP",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
