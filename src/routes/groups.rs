// ============================================================================
// Group Routes
// ============================================================================
//
// Endpoints:
// - POST /api/group - Create a group (caller becomes admin)
// - GET /api/group?id= - Read a group
// - POST /api/group/:id/members - Add a member (admin)
// - DELETE /api/group/:id/members/:address - Leave, or remove a member (admin)
// - POST /api/group/:id/admins - Assign admin (admin)
// - DELETE /api/group/:id/admins/:address - Revoke admin (admin)
// - PATCH /api/group/:id - Update name, description, display picture (admin)
// - GET /api/group/:id/events - System event log (members and admins)
//
// ============================================================================

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::address::Address;
use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::group::{Group, GroupMutation, NewGroup};
use crate::routes::extractors::Authenticated;

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct AddressBody {
    pub address: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub display_picture: Option<String>,
}

/// POST /api/group
pub async fn create_group(
    State(ctx): State<Arc<AppContext>>,
    Authenticated(caller): Authenticated,
    Json(new): Json<NewGroup>,
) -> AppResult<impl IntoResponse> {
    let group = ctx.groups.create(new, &caller).await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// GET /api/group?id=
pub async fn get_group(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<GroupQuery>,
) -> AppResult<Json<Group>> {
    Ok(Json(ctx.groups.get(&query.id).await?))
}

/// POST /api/group/:id/members
pub async fn add_member(
    State(ctx): State<Arc<AppContext>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(body): Json<AddressBody>,
) -> AppResult<Json<Group>> {
    let member = Address::parse(&body.address)?;
    let group = ctx
        .groups
        .mutate_as(&id, &caller, GroupMutation::AddMember(member))
        .await?;
    Ok(Json(group))
}

/// DELETE /api/group/:id/members/:address
///
/// Removing yourself is a leave; removing anyone else needs admin rights.
pub async fn remove_member(
    State(ctx): State<Arc<AppContext>>,
    Authenticated(caller): Authenticated,
    Path((id, address)): Path<(String, String)>,
) -> AppResult<Json<Group>> {
    let member = Address::parse(&address)?;
    let mutation = if member == caller {
        GroupMutation::RemoveMember(member)
    } else {
        GroupMutation::RemoveMemberByAdmin(member)
    };
    Ok(Json(ctx.groups.mutate_as(&id, &caller, mutation).await?))
}

/// POST /api/group/:id/admins
pub async fn add_admin(
    State(ctx): State<Arc<AppContext>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(body): Json<AddressBody>,
) -> AppResult<Json<Group>> {
    let admin = Address::parse(&body.address)?;
    let group = ctx
        .groups
        .mutate_as(&id, &caller, GroupMutation::AddAdmin(admin))
        .await?;
    Ok(Json(group))
}

/// DELETE /api/group/:id/admins/:address
pub async fn remove_admin(
    State(ctx): State<Arc<AppContext>>,
    Authenticated(caller): Authenticated,
    Path((id, address)): Path<(String, String)>,
) -> AppResult<Json<Group>> {
    let admin = Address::parse(&address)?;
    let group = ctx
        .groups
        .mutate_as(&id, &caller, GroupMutation::RemoveAdmin(admin))
        .await?;
    Ok(Json(group))
}

/// PATCH /api/group/:id
///
/// Each supplied field is its own transition and its own event.
pub async fn update_group(
    State(ctx): State<Arc<AppContext>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
    Json(update): Json<GroupUpdate>,
) -> AppResult<Json<Group>> {
    if update.name.is_none() && update.description.is_none() && update.display_picture.is_none()
    {
        return Err(AppError::bad_request(
            "one of name, description, display_picture is required",
        ));
    }
    if matches!(update.name.as_deref(), Some("")) {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let mutations = [
        update.name.map(GroupMutation::UpdateName),
        update.description.map(GroupMutation::UpdateDescription),
        update.display_picture.map(GroupMutation::UpdateDisplayPicture),
    ];

    let mut updated = None;
    for mutation in mutations.into_iter().flatten() {
        updated = Some(ctx.groups.mutate_as(&id, &caller, mutation).await?);
    }
    updated
        .map(Json)
        .ok_or_else(|| AppError::bad_request("nothing to update"))
}

/// GET /api/group/:id/events
pub async fn get_group_events(
    State(ctx): State<Arc<AppContext>>,
    Authenticated(caller): Authenticated,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let group = ctx.groups.get(&id).await?;
    if !group.is_member(caller.as_str()) && !group.is_admin(caller.as_str()) {
        return Err(AppError::forbidden("group membership required"));
    }

    let events = ctx.events.events_for_group(&id).await?;
    Ok(Json(json!({
        "group_id": id,
        "events": events,
    })))
}
