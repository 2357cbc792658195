use axum::Json;
use axum::extract::{Path, State};
use chrono::Utc;

use parlor_db::RoomStore;
use parlor_types::api::{HeartbeatRequest, OkResponse, OnlineResponse};

use crate::error::ApiError;
use crate::rooms;
use crate::state::{AppState, AppStateInner};

/// A client counts as online while its newest heartbeat is this recent.
pub const HEARTBEAT_TTL_SECS: i64 = 30;

/// Records a liveness beat. Every call first sweeps rows past the TTL;
/// the sweep rides on heartbeat traffic instead of a background task.
pub fn beat(state: &AppStateInner, room: &str, client_id: &str) -> Result<(), ApiError> {
    let client_id = client_id.trim();
    if client_id.is_empty() {
        return Err(ApiError::Validation(vec!["client_id"]));
    }
    let store = rooms::open_approved(state, room)?;
    beat_at(&store, client_id, Utc::now().timestamp())
}

pub fn beat_at(store: &RoomStore, client_id: &str, now: i64) -> Result<(), ApiError> {
    store.purge_heartbeats_before(now - HEARTBEAT_TTL_SECS)?;
    store.upsert_heartbeat(client_id, now)?;
    Ok(())
}

/// How many clients beat within the TTL window. Unknown or unapproved
/// rooms degrade to zero instead of erroring.
pub fn online_count(state: &AppStateInner, room: &str) -> Result<i64, ApiError> {
    let Some(store) = state.stores.get_existing(room)? else {
        return Ok(0);
    };
    online_count_at(&store, Utc::now().timestamp())
}

pub fn online_count_at(store: &RoomStore, now: i64) -> Result<i64, ApiError> {
    Ok(store.count_heartbeats_since(now - HEARTBEAT_TTL_SECS)?)
}

// -- Handlers --

pub async fn heartbeat(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(request): Json<HeartbeatRequest>,
) -> Result<Json<OkResponse>, ApiError> {
    beat(&state, &room, &request.client_id)?;
    Ok(Json(OkResponse::ok()))
}

pub async fn online(
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Json<OnlineResponse>, ApiError> {
    let online = online_count(&state, &room)?;
    Ok(Json(OnlineResponse { online }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_state;

    #[test]
    fn beats_expire_after_the_ttl() {
        let store = RoomStore::open_in_memory().unwrap();
        let t = 1_000;

        beat_at(&store, "client-a", t).unwrap();
        assert_eq!(online_count_at(&store, t + 10).unwrap(), 1);
        assert_eq!(online_count_at(&store, t + 31).unwrap(), 0);
    }

    #[test]
    fn a_later_beat_sweeps_stale_rows() {
        let store = RoomStore::open_in_memory().unwrap();
        let t = 1_000;

        beat_at(&store, "client-a", t).unwrap();
        beat_at(&store, "client-b", t + 31).unwrap();

        // The sweep physically removed client-a, not just filtered it.
        assert_eq!(store.count_heartbeats_since(0).unwrap(), 1);
        assert_eq!(online_count_at(&store, t + 31).unwrap(), 1);
    }

    #[test]
    fn rebeating_keeps_a_client_online() {
        let store = RoomStore::open_in_memory().unwrap();
        let t = 1_000;

        beat_at(&store, "client-a", t).unwrap();
        beat_at(&store, "client-a", t + 25).unwrap();
        assert_eq!(online_count_at(&store, t + 40).unwrap(), 1);
    }

    #[tokio::test]
    async fn blank_client_id_is_a_validation_error() {
        let (_dir, state) = test_state(false);
        assert!(matches!(
            beat(&state, "lounge", "  "),
            Err(ApiError::Validation(fields)) if fields == vec!["client_id"]
        ));
    }

    #[tokio::test]
    async fn unapproved_room_rejects_beats_but_counts_zero() {
        let (_dir, state) = test_state(true);
        assert!(matches!(
            beat(&state, "lounge", "client-a"),
            Err(ApiError::RoomNotApproved)
        ));
        assert_eq!(online_count(&state, "lounge").unwrap(), 0);
    }
}
