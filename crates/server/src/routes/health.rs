use std::sync::Arc;

use axum::{Extension, Json};
use chess_core::OpeningTrie;
use serde_json::{json, Value};

pub async fn health_check(Extension(openings): Extension<Arc<OpeningTrie>>) -> Json<Value> {
    Json(json!({ "status": "ok", "openings": openings.len() }))
}
