use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use tracing::{info, warn};

use parlor_db::RoomStore;
use parlor_types::api::{EnsureRoomResponse, OkResponse, RoomStatus, TokenQuery};

use crate::error::ApiError;
use crate::mail;
use crate::state::{AppState, AppStateInner};
use crate::tokens::{TokenPayload, TokenPurpose};

const STATUS_APPROVED: &str = "approved";
const STATUS_DENIED: &str = "denied";

/// Decides whether `room` may be used, provisioning storage or filing an
/// approval request as a side effect. An existing store file is
/// authoritative proof of approval.
pub fn ensure_accessible(state: &AppStateInner, room: &str) -> Result<RoomStatus, ApiError> {
    if state.stores.exists(room) {
        return Ok(RoomStatus::Approved);
    }

    if !state.config.require_approval {
        state.stores.get_or_create(room)?;
        return Ok(RoomStatus::Approved);
    }

    if let Some(request) = state.registry.get_room_request(room)? {
        return Ok(match request.status.as_str() {
            STATUS_APPROVED => {
                // Approved earlier but the store is gone; re-provision.
                state.stores.get_or_create(room)?;
                RoomStatus::Approved
            }
            STATUS_DENIED => RoomStatus::Denied,
            _ => RoomStatus::Pending,
        });
    }

    // A concurrent insert race resolves to one winner; only the winner
    // notifies the administrator.
    if state.registry.insert_room_request(room)? {
        info!(room, "room approval requested");
        request_approval(state, room);
    }
    Ok(RoomStatus::Pending)
}

/// Write access to an approved room's store. Files an approval request
/// for never-seen names the same way `ensure_accessible` does.
pub fn open_approved(state: &AppStateInner, room: &str) -> Result<Arc<RoomStore>, ApiError> {
    if ensure_accessible(state, room)? != RoomStatus::Approved {
        return Err(ApiError::RoomNotApproved);
    }
    Ok(state.stores.get_or_create(room)?)
}

fn request_approval(state: &AppStateInner, room: &str) {
    let payload = TokenPayload {
        room: Some(room.to_string()),
        ..Default::default()
    };
    let approve = state.tokens.sign(payload.clone(), TokenPurpose::ApproveRoom);
    let deny = state.tokens.sign(payload, TokenPurpose::DenyRoom);
    match (approve, deny) {
        (Ok(approve), Ok(deny)) => {
            let base = &state.config.base_url;
            let body = format!(
                "Room \"{room}\" was requested.\n\
                 Approve: {base}/rooms/approve?token={approve}\n\
                 Deny: {base}/rooms/deny?token={deny}",
            );
            mail::dispatch(
                &state.notifier,
                &state.config.admin_email,
                &format!("Room request: {room}"),
                &body,
            );
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!("could not issue approval tokens for {}: {:#}", room, e);
        }
    }
}

/// Redeems an approval token: provisions the store and records the
/// status. Re-running an already-redeemed token succeeds quietly.
pub fn approve_room(state: &AppStateInner, token: &str) -> Result<(), ApiError> {
    let payload = state.tokens.verify(token, TokenPurpose::ApproveRoom)?;
    let room = payload.room.ok_or(ApiError::TokenInvalid)?;

    let request = state
        .registry
        .get_room_request(&room)?
        .ok_or(ApiError::RequestNotFound)?;
    if request.status == STATUS_APPROVED {
        return Ok(());
    }

    state.stores.get_or_create(&room)?;
    state.registry.set_room_status(&room, STATUS_APPROVED)?;
    info!(room, "room approved");
    Ok(())
}

/// Redeems a denial token. Approval never regresses: denying a room that
/// was already approved leaves it approved.
pub fn deny_room(state: &AppStateInner, token: &str) -> Result<(), ApiError> {
    let payload = state.tokens.verify(token, TokenPurpose::DenyRoom)?;
    let room = payload.room.ok_or(ApiError::TokenInvalid)?;

    let request = state
        .registry
        .get_room_request(&room)?
        .ok_or(ApiError::RequestNotFound)?;
    if request.status == STATUS_APPROVED {
        return Ok(());
    }

    state.registry.set_room_status(&room, STATUS_DENIED)?;
    info!(room, "room denied");
    Ok(())
}

// -- Handlers --

pub async fn enter(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<EnsureRoomResponse>, ApiError> {
    let status = ensure_accessible(&state, &room)?;
    Ok(Json(EnsureRoomResponse { status }))
}

pub async fn approve(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<OkResponse>, ApiError> {
    approve_room(&state, &query.token)?;
    Ok(Json(OkResponse::ok()))
}

pub async fn deny(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<OkResponse>, ApiError> {
    deny_room(&state, &query.token)?;
    Ok(Json(OkResponse::ok()))
}
