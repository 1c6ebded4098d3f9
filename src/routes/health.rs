use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;

/// GET /health
pub async fn health_check(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "domain": ctx.config.domain,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
