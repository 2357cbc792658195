use serde::{Deserialize, Serialize};

// -- Rooms --

/// Approval state of a room as seen by a client entering it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Approved,
    Pending,
    Denied,
}

#[derive(Debug, Serialize)]
pub struct EnsureRoomResponse {
    pub status: RoomStatus,
}

// -- Messages --

/// Fields default to empty strings so that an absent field surfaces as a
/// validation error listing it, not as a deserialization failure.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: i64,
    pub room: String,
    pub nickname: String,
    pub email: String,
    pub content: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: MessageResponse,
}

/// Posting from an unverified device: the client holds on to the device
/// id and retries once the emailed confirmation link has been followed.
#[derive(Debug, Serialize)]
pub struct VerificationRequiredResponse {
    pub success: bool,
    pub error: String,
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteMessageRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub device_id: String,
}

// -- History --

/// Cursor selection: `since_id` wins over `before_id`, which wins over
/// the plain page number.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<String>,
    pub since_id: Option<i64>,
    pub before_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageResponse>,
    pub has_next: bool,
    pub has_prev: bool,
    pub total: i64,
}

impl HistoryResponse {
    /// The shape served for rooms that have no store yet.
    pub fn empty() -> Self {
        Self {
            messages: Vec::new(),
            has_next: false,
            has_prev: false,
            total: 0,
        }
    }
}

// -- Presence --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeartbeatRequest {
    #[serde(default)]
    pub client_id: String,
}

#[derive(Debug, Serialize)]
pub struct OnlineResponse {
    pub online: i64,
}

// -- Tokens --

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

// -- Generic envelopes --

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub success: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}
