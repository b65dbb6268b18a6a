//! Liveness-only health route. The control plane (session creation,
//! call routing, metrics scraping) is explicitly out of scope (spec
//! §1 Non-goals), so this is the only HTTP surface besides the
//! telephony WebSocket upgrade.

use axum::response::IntoResponse;
use axum::Json;

pub async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
