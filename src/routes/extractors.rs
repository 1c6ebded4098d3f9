// ============================================================================
// Axum Extractors
// ============================================================================
//
// - Authenticated: verifies the `Authorization: EMSG ...` envelope against the
//   inbound method and path, rejects with 401 otherwise
// - MaybeAuthenticated: same check, but any failure yields `None`
//
// Usage:
// ```rust
// async fn handler(Authenticated(caller): Authenticated, ...) -> AppResult<...> {
//     // caller is the verified Address
// }
// ```
//
// ============================================================================

use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::sync::Arc;

use crate::address::Address;
use crate::auth::AuthError;
use crate::context::AppContext;
use crate::error::AppError;

/// Caller address proven by a valid signed envelope
#[derive(Debug, Clone)]
pub struct Authenticated(pub Address);

/// Caller address if a valid envelope was presented
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<Address>);

async fn verify_parts(parts: &Parts, ctx: &AppContext) -> Result<Address, AuthError> {
    // Nested routers rewrite `parts.uri`; the signature covers the full path
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.0.path().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let header = match parts.headers.get(AUTHORIZATION) {
        Some(value) => Some(
            value
                .to_str()
                .map_err(|_| AuthError::MalformedEnvelope("non-ASCII header".to_string()))?,
        ),
        None => None,
    };

    ctx.authenticator
        .verify_header(parts.method.as_str(), &path, header)
        .await
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for Authenticated {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        match verify_parts(parts, state).await {
            Ok(address) => {
                tracing::trace!(
                    address_hash = %state.config.logging.address(address.as_str()),
                    "Request authenticated"
                );
                Ok(Authenticated(address))
            }
            Err(e) => Err(AppError::from(e).into_response()),
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppContext>> for MaybeAuthenticated {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppContext>,
    ) -> Result<Self, Self::Rejection> {
        if !parts.headers.contains_key(AUTHORIZATION) {
            return Ok(MaybeAuthenticated(None));
        }

        match verify_parts(parts, state).await {
            Ok(address) => Ok(MaybeAuthenticated(Some(address))),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid optional authorization");
                Ok(MaybeAuthenticated(None))
            }
        }
    }
}
