use axum::Json;
use axum::extract::{Query, State};
use tracing::info;

use parlor_types::api::{OkResponse, TokenQuery};

use crate::error::ApiError;
use crate::state::{AppState, AppStateInner};
use crate::tokens::TokenPurpose;

/// Posting gate: checks the device identity alone. The device stays
/// bound to whichever email confirmed it first, independent of the email
/// on the current request.
pub fn is_verified(state: &AppStateInner, device_id: &str) -> Result<bool, ApiError> {
    Ok(state.registry.get_device(device_id)?.is_some())
}

/// Deletion gate: device and email must both match the stored binding.
/// Deliberately stricter than the posting gate.
pub fn is_verified_for(
    state: &AppStateInner,
    device_id: &str,
    email: &str,
) -> Result<bool, ApiError> {
    Ok(state
        .registry
        .get_device(device_id)?
        .is_some_and(|device| device.email == email))
}

/// Records the binding unless the device already has one.
pub fn confirm(state: &AppStateInner, email: &str, device_id: &str) -> Result<(), ApiError> {
    state.registry.insert_device_if_absent(device_id, email)?;
    Ok(())
}

/// Redeems an emailed confirmation token.
pub fn confirm_from_token(state: &AppStateInner, token: &str) -> Result<(), ApiError> {
    let payload = state.tokens.verify(token, TokenPurpose::EmailConfirm)?;
    let (email, device_id) = match (payload.email, payload.device_id) {
        (Some(email), Some(device_id)) => (email, device_id),
        _ => return Err(ApiError::TokenInvalid),
    };
    confirm(state, &email, &device_id)?;
    info!(device_id, "device confirmed");
    Ok(())
}

// -- Handlers --

pub async fn confirm_device(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<OkResponse>, ApiError> {
    confirm_from_token(&state, &query.token)?;
    Ok(Json(OkResponse::ok()))
}
