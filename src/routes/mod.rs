// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Main router assembly and middleware
// - health.rs: Liveness endpoint
// - users.rs: Identity registration and lookup
// - messages.rs: Message submission and inbox
// - groups.rs: Group lifecycle, membership and audit log
// - routing.rs: DNS route discovery endpoints
// - extractors.rs: Signed envelope extractors
// - middleware.rs: Request logging
//
// ============================================================================

mod extractors;
mod groups;
mod health;
mod messages;
mod middleware;
mod routing;
mod users;

use axum::{
    routing::{delete, get, patch, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;

pub use extractors::{Authenticated, MaybeAuthenticated};

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        // Identities
        .route("/api/user", post(users::register_user).get(users::get_user))
        // Messages
        .route("/api/message", post(messages::send_message))
        .route("/api/messages", get(messages::get_messages))
        // Groups
        .route("/api/group", post(groups::create_group).get(groups::get_group))
        .route("/api/group/:id", patch(groups::update_group))
        .route("/api/group/:id/members", post(groups::add_member))
        .route(
            "/api/group/:id/members/:address",
            delete(groups::remove_member),
        )
        .route("/api/group/:id/admins", post(groups::add_admin))
        .route("/api/group/:id/admins/:address", delete(groups::remove_admin))
        .route("/api/group/:id/events", get(groups::get_group_events))
        // Routing
        .route("/api/route", get(routing::get_route))
        .route("/api/route/validate", post(routing::validate_addresses))
        .route("/api/route/message", post(routing::route_message))
        // Apply middleware (order matters - last added runs first)
        .layer(
            ServiceBuilder::new()
                // Tracing layer (outermost - runs first)
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(middleware::request_logging))
                .into_inner(),
        )
        .with_state(app_context)
}
