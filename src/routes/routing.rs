// ============================================================================
// Routing Routes
// ============================================================================
//
// Endpoints:
// - GET /api/route?address= - Resolve the serving endpoint of an address
// - POST /api/route/validate - Per-address validity report
// - POST /api/route/message - Group recipients by serving endpoint
//
// ============================================================================

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::AppResult;
use crate::routes::users::AddressQuery;
use crate::routing::RoutingResolver;

#[derive(Debug, Deserialize)]
pub struct AddressList {
    pub addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecipientList {
    pub recipients: Vec<String>,
}

/// GET /api/route?address=
pub async fn get_route(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<AddressQuery>,
) -> AppResult<impl IntoResponse> {
    let info = ctx.resolver.get_route_info(&query.address).await?;
    let record = info.to_record();
    Ok(Json(json!({
        "address": query.address,
        "server": record.server,
        "pubkey": record.pubkey,
        "version": record.version,
        "ttl": record.ttl,
        "structured": info.is_structured(),
    })))
}

/// POST /api/route/validate
pub async fn validate_addresses(Json(body): Json<AddressList>) -> impl IntoResponse {
    Json(json!({
        "results": RoutingResolver::validate_addresses(&body.addresses),
    }))
}

/// POST /api/route/message
pub async fn route_message(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<RecipientList>,
) -> AppResult<impl IntoResponse> {
    let routes = ctx.resolver.route_message(&body.recipients).await?;
    Ok(Json(json!({ "routes": routes })))
}
