// ============================================================================
// Message Routes
// ============================================================================
//
// Endpoints:
// - POST /api/message - Submit a message as the authenticated caller
// - GET /api/messages - Messages delivered to the authenticated caller
//
// ============================================================================

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::AppResult;
use crate::message::Message;
use crate::routes::extractors::Authenticated;

/// POST /api/message
pub async fn send_message(
    State(ctx): State<Arc<AppContext>>,
    Authenticated(caller): Authenticated,
    Json(message): Json<Message>,
) -> AppResult<impl IntoResponse> {
    let receipt = ctx.fanout.send(&caller, message).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /api/messages
pub async fn get_messages(
    State(ctx): State<Arc<AppContext>>,
    Authenticated(caller): Authenticated,
) -> AppResult<impl IntoResponse> {
    let messages = ctx.fanout.inbox(&caller).await?;
    Ok(Json(json!({
        "address": caller,
        "count": messages.len(),
        "messages": messages,
    })))
}
