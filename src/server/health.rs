//! Health check and banner endpoints.
//!
//! `/health` returns 200 if the server is running. It never calls GitHub, so
//! it stays green while the upstream is down or rate-limiting us.

use axum::Json;
use serde_json::{Value, json};

/// Health check handler.
///
/// # Example
///
/// ```ignore
/// GET /health HTTP/1.1
///
/// HTTP/1.1 200 OK
/// Content-Type: application/json
///
/// {"status":"ok"}
/// ```
pub async fn health_handler() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

/// Service banner.
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
