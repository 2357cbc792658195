use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{error, info, warn};

use parlor_db::models::MessageRow;
use parlor_db::RoomStore;
use parlor_types::api::{
    DeleteMessageRequest, HistoryQuery, HistoryResponse, MessageResponse, OkResponse,
    SendMessageRequest, SendMessageResponse, VerificationRequiredResponse,
};

use crate::devices;
use crate::error::ApiError;
use crate::mail;
use crate::replies;
use crate::rooms;
use crate::state::{AppState, AppStateInner};
use crate::tokens::{TokenPayload, TokenPurpose};

pub const PAGE_SIZE: i64 = 10;

/// Outcome of a post attempt: either the stored message or the signal
/// that the device must confirm its email first. The client keeps the
/// device id and retries after confirmation.
#[derive(Debug)]
pub enum SendOutcome {
    Posted(MessageResponse),
    VerificationRequired { device_id: String },
}

pub fn post_message(
    state: &AppStateInner,
    room: &str,
    request: &SendMessageRequest,
) -> Result<SendOutcome, ApiError> {
    let nickname = request.nickname.trim();
    let email = request.email.trim();
    let content = request.content.trim();
    let device_id = request.device_id.trim();

    let mut missing = Vec::new();
    if nickname.is_empty() {
        missing.push("nickname");
    }
    if email.is_empty() {
        missing.push("email");
    }
    if content.is_empty() {
        missing.push("content");
    }
    if device_id.is_empty() {
        missing.push("device_id");
    }
    if !missing.is_empty() {
        return Err(ApiError::Validation(missing));
    }

    let store = rooms::open_approved(state, room)?;

    // Nothing is persisted for an unverified device; the emailed token
    // carries everything needed to bind it.
    if !devices::is_verified(state, device_id)? {
        request_device_confirmation(state, room, email, device_id);
        return Ok(SendOutcome::VerificationRequired {
            device_id: device_id.to_string(),
        });
    }

    let transformed = replies::transform(&store, content, email)?;
    let row = store.insert_message(nickname, email, &transformed.content)?;
    info!(room, id = row.id, "message stored");

    for target in &transformed.notify {
        mail::dispatch(
            &state.notifier,
            target,
            &format!("New reply in {room}"),
            &format!(
                "{nickname} referenced one of your messages in \"{room}\":\n{}",
                transformed.content
            ),
        );
    }

    Ok(SendOutcome::Posted(to_response(room, row)))
}

fn request_device_confirmation(state: &AppStateInner, room: &str, email: &str, device_id: &str) {
    let payload = TokenPayload {
        room: Some(room.to_string()),
        email: Some(email.to_string()),
        device_id: Some(device_id.to_string()),
    };
    match state.tokens.sign(payload, TokenPurpose::EmailConfirm) {
        Ok(token) => {
            let body = format!(
                "Confirm this device to post in \"{room}\": {base}/devices/confirm?token={token}",
                base = state.config.base_url,
            );
            mail::dispatch(&state.notifier, email, "Confirm your device", &body);
        }
        Err(e) => warn!("could not issue confirmation token for {}: {:#}", device_id, e),
    }
}

/// Runs one of the three query modes over a room's log.
/// Precedence: `since_id` over `before_id` over the page number.
pub fn query_history(
    store: &RoomStore,
    room: &str,
    query: &HistoryQuery,
) -> Result<HistoryResponse, ApiError> {
    if let Some(since_id) = query.since_id {
        let rows = store.messages_since(since_id)?;
        let total = rows.len() as i64;
        return Ok(HistoryResponse {
            messages: rows.into_iter().map(|row| to_response(room, row)).collect(),
            has_next: false,
            has_prev: false,
            total,
        });
    }

    if let Some(before_id) = query.before_id {
        let rows = store.messages_before(before_id, PAGE_SIZE)?;
        let total = store.count_before(before_id)?;
        // More history exists only below the oldest id just returned.
        let has_next = match rows.last() {
            Some(oldest) => store.exists_below(oldest.id)?,
            None => false,
        };
        return Ok(HistoryResponse {
            messages: rows.into_iter().map(|row| to_response(room, row)).collect(),
            has_next,
            has_prev: false,
            total,
        });
    }

    let page = query
        .page
        .as_deref()
        .and_then(|value| value.trim().parse::<i64>().ok())
        .unwrap_or(1)
        .max(1);
    let total = store.count_messages()?;
    let offset = (page - 1) * PAGE_SIZE;
    let rows = store.page_desc(PAGE_SIZE, offset)?;
    let returned = rows.len() as i64;
    Ok(HistoryResponse {
        messages: rows.into_iter().map(|row| to_response(room, row)).collect(),
        has_next: offset + returned < total,
        has_prev: page > 1,
        total,
    })
}

/// Deletes a message on behalf of a verified device. The device binding
/// is checked before ownership; the administrator may delete anything.
pub fn delete_message(
    state: &AppStateInner,
    room: &str,
    id: i64,
    request: &DeleteMessageRequest,
) -> Result<(), ApiError> {
    let email = request.email.trim();
    let device_id = request.device_id.trim();

    let Some(store) = state.stores.get_existing(room)? else {
        return Err(ApiError::RoomNotApproved);
    };

    if !devices::is_verified_for(state, device_id, email)? {
        return Err(ApiError::Forbidden);
    }

    let Some(message) = store.get_message(id)? else {
        return Err(ApiError::NotFound);
    };

    let is_author = message.email.eq_ignore_ascii_case(email);
    let is_admin = state.config.admin_email.eq_ignore_ascii_case(email);
    if !is_author && !is_admin {
        return Err(ApiError::Forbidden);
    }

    store.delete_message(id)?;
    info!(room, id, "message deleted");
    Ok(())
}

fn to_response(room: &str, row: MessageRow) -> MessageResponse {
    MessageResponse {
        id: row.id,
        room: room.to_string(),
        nickname: row.nickname,
        email: row.email,
        content: row.content,
        timestamp: row.created_at,
    }
}

// -- Handlers --

pub async fn send_message(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    // Run blocking DB work off the async runtime
    let inner = state.clone();
    let outcome = tokio::task::spawn_blocking(move || post_message(&inner, &room, &request))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("join error"))
        })??;

    Ok(match outcome {
        SendOutcome::Posted(message) => Json(SendMessageResponse {
            success: true,
            message,
        })
        .into_response(),
        SendOutcome::VerificationRequired { device_id } => (
            StatusCode::FORBIDDEN,
            Json(VerificationRequiredResponse {
                success: false,
                error: "verification_required".to_string(),
                device_id,
            }),
        )
            .into_response(),
    })
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let inner = state.clone();
    let response = tokio::task::spawn_blocking(move || {
        let Some(store) = inner.stores.get_existing(&room)? else {
            return Ok(HistoryResponse::empty());
        };
        query_history(&store, &room, &query)
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow::anyhow!("join error"))
    })??;

    Ok(Json(response))
}

pub async fn remove_message(
    State(state): State<AppState>,
    Path((room, id)): Path<(String, i64)>,
    Json(request): Json<DeleteMessageRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    delete_message(&state, &room, id, &request)?;
    Ok(Json(OkResponse::ok()))
}
