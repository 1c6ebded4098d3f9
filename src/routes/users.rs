// ============================================================================
// Identity Routes
// ============================================================================
//
// Endpoints:
// - POST /api/user - Register an identity (upsert)
// - GET /api/user?address= - Look up an identity
//
// First registration of an address is open. Replacing an existing identity
// requires a request signed by the key currently registered for it.
//
// ============================================================================

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::address::Address;
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::identity::{Identity, RegistrationRequest};
use crate::routes::extractors::MaybeAuthenticated;

#[derive(Debug, Deserialize)]
pub struct AddressQuery {
    pub address: String,
}

/// POST /api/user
pub async fn register_user(
    State(ctx): State<Arc<AppContext>>,
    MaybeAuthenticated(caller): MaybeAuthenticated,
    Json(request): Json<RegistrationRequest>,
) -> AppResult<impl IntoResponse> {
    let identity = Identity::register(request)?;

    if !ctx
        .config
        .local_domains
        .contains(identity.address.domain())
    {
        return Err(AppError::forbidden(format!(
            "domain {} is not served here",
            identity.address.domain()
        )));
    }

    let existing = ctx.store.get_identity(identity.address.as_str()).await?;
    let status = match existing {
        None => StatusCode::CREATED,
        Some(_) if caller.as_ref() == Some(&identity.address) => StatusCode::OK,
        Some(_) => {
            return Err(AppError::forbidden(
                "updating an identity requires a request signed by its current key",
            ))
        }
    };

    ctx.store.put_identity(identity.clone()).await?;

    tracing::info!(
        address_hash = %ctx.config.logging.address(identity.address.as_str()),
        updated = status == StatusCode::OK,
        "Identity registered"
    );

    Ok((status, Json(identity)))
}

/// GET /api/user?address=
pub async fn get_user(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<AddressQuery>,
) -> AppResult<Json<Identity>> {
    let address = Address::parse(&query.address)?;
    let identity = ctx
        .store
        .get_identity(address.as_str())
        .await?
        .ok_or_else(|| AppError::not_found(format!("identity {}", address)))?;
    Ok(Json(identity))
}
