use anyhow::Result;
use rusqlite::Connection;

/// Schema for the shared registry database.
pub fn run_registry(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS room_requests (
            room          TEXT PRIMARY KEY,
            status        TEXT NOT NULL DEFAULT 'pending',
            requested_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS verified_devices (
            device_id     TEXT PRIMARY KEY,
            email         TEXT NOT NULL,
            verified_at   TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

/// Schema for one room's store. AUTOINCREMENT keeps message ids
/// monotonic even after the newest row is deleted.
pub fn run_room(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            nickname    TEXT NOT NULL,
            email       TEXT NOT NULL,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS heartbeats (
            client_id   TEXT PRIMARY KEY,
            last_seen   INTEGER NOT NULL
        );
        ",
    )?;
    Ok(())
}
