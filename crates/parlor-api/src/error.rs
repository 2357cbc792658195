use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use parlor_types::api::ErrorResponse;

use crate::tokens::TokenError;

/// Failure taxonomy for every operation. Expired and tampered tokens are
/// collapsed into `TokenInvalid` here; the cryptographic cause never
/// reaches the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing required fields")]
    Validation(Vec<&'static str>),
    #[error("room is not approved")]
    RoomNotApproved,
    #[error("message not found")]
    NotFound,
    #[error("not allowed")]
    Forbidden,
    #[error("invalid or expired token")]
    TokenInvalid,
    #[error("no pending request for this room")]
    RequestNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<TokenError> for ApiError {
    fn from(_: TokenError) -> Self {
        ApiError::TokenInvalid
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Validation(_) | ApiError::TokenInvalid => StatusCode::BAD_REQUEST,
            ApiError::RoomNotApproved | ApiError::NotFound | ApiError::RequestNotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Internal details are logged, never served.
        let message = match &self {
            ApiError::Internal(err) => {
                error!("internal error: {:#}", err);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let missing = match &self {
            ApiError::Validation(fields) => {
                Some(fields.iter().map(|f| f.to_string()).collect())
            }
            _ => None,
        };

        let body = ErrorResponse {
            success: false,
            error: message,
            missing,
        };
        (status, Json(body)).into_response()
    }
}
