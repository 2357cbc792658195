/// Database row types — these map directly to SQLite rows.
/// API-facing shapes live in parlor-types to keep this layer independent.

pub struct MessageRow {
    pub id: i64,
    pub nickname: String,
    pub email: String,
    pub content: String,
    pub created_at: String,
}

pub struct RoomRequestRow {
    pub room: String,
    pub status: String,
    pub requested_at: String,
}

pub struct VerifiedDeviceRow {
    pub device_id: String,
    pub email: String,
}
