use crate::models::{MessageRow, RoomRequestRow, VerifiedDeviceRow};
use crate::{RegistryDb, RoomStore};
use anyhow::Result;
use rusqlite::Connection;

impl RegistryDb {
    // -- Room requests --

    /// Files a pending request unless one already exists for the name.
    /// Returns true iff this call inserted the row; a concurrent loser
    /// observes false and the existing row stands.
    pub fn insert_room_request(&self, room: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO room_requests (room, status) VALUES (?1, 'pending')",
                [room],
            )?;
            Ok(inserted > 0)
        })
    }

    pub fn get_room_request(&self, room: &str) -> Result<Option<RoomRequestRow>> {
        self.with_conn(|conn| query_room_request(conn, room))
    }

    pub fn set_room_status(&self, room: &str, status: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE room_requests SET status = ?2 WHERE room = ?1",
                (room, status),
            )?;
            Ok(())
        })
    }

    // -- Verified devices --

    /// First confirmation wins: an existing binding for the device id is
    /// left untouched regardless of the email on this call.
    pub fn insert_device_if_absent(&self, device_id: &str, email: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO verified_devices (device_id, email) VALUES (?1, ?2)",
                (device_id, email),
            )?;
            Ok(())
        })
    }

    pub fn get_device(&self, device_id: &str) -> Result<Option<VerifiedDeviceRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT device_id, email FROM verified_devices WHERE device_id = ?1")?;
            let row = stmt
                .query_row([device_id], |row| {
                    Ok(VerifiedDeviceRow {
                        device_id: row.get(0)?,
                        email: row.get(1)?,
                    })
                })
                .optional()?;
            Ok(row)
        })
    }
}

impl RoomStore {
    // -- Messages --

    pub fn insert_message(&self, nickname: &str, email: &str, content: &str) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (nickname, email, content) VALUES (?1, ?2, ?3)",
                (nickname, email, content),
            )?;
            let id = conn.last_insert_rowid();
            query_message(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("inserted message {} not found", id))
        })
    }

    pub fn get_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    pub fn count_messages(&self) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?)
        })
    }

    /// Returns true iff a row was deleted.
    pub fn delete_message(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Pagination --

    /// One descending-by-id window, newest first.
    pub fn page_desc(&self, limit: i64, offset: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, nickname, email, content, created_at FROM messages
                 ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            )?;
            collect_messages(stmt.query_map((limit, offset), map_message)?)
        })
    }

    /// Everything newer than `since_id`, oldest first, uncapped.
    pub fn messages_since(&self, since_id: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, nickname, email, content, created_at FROM messages
                 WHERE id > ?1 ORDER BY id ASC",
            )?;
            collect_messages(stmt.query_map([since_id], map_message)?)
        })
    }

    /// The slice just below `before_id`, newest of that slice first.
    pub fn messages_before(&self, before_id: i64, limit: i64) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, nickname, email, content, created_at FROM messages
                 WHERE id < ?1 ORDER BY id DESC LIMIT ?2",
            )?;
            collect_messages(stmt.query_map((before_id, limit), map_message)?)
        })
    }

    pub fn count_before(&self, before_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM messages WHERE id < ?1",
                [before_id],
                |row| row.get(0),
            )?)
        })
    }

    /// Whether any history remains strictly below `id`.
    pub fn exists_below(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM messages WHERE id < ?1)",
                [id],
                |row| row.get(0),
            )?)
        })
    }

    // -- Heartbeats --

    /// Last-writer-wins upsert of the client's liveness row.
    pub fn upsert_heartbeat(&self, client_id: &str, now: i64) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO heartbeats (client_id, last_seen) VALUES (?1, ?2)
                 ON CONFLICT(client_id) DO UPDATE SET last_seen = excluded.last_seen",
                (client_id, now),
            )?;
            Ok(())
        })
    }

    /// Drops rows last seen strictly before `cutoff`. Returns how many.
    pub fn purge_heartbeats_before(&self, cutoff: i64) -> Result<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM heartbeats WHERE last_seen < ?1", [cutoff])?)
        })
    }

    pub fn count_heartbeats_since(&self, cutoff: i64) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM heartbeats WHERE last_seen >= ?1",
                [cutoff],
                |row| row.get(0),
            )?)
        })
    }
}

fn query_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let mut stmt = conn
        .prepare("SELECT id, nickname, email, content, created_at FROM messages WHERE id = ?1")?;
    let row = stmt.query_row([id], map_message).optional()?;
    Ok(row)
}

fn query_room_request(conn: &Connection, room: &str) -> Result<Option<RoomRequestRow>> {
    let mut stmt =
        conn.prepare("SELECT room, status, requested_at FROM room_requests WHERE room = ?1")?;
    let row = stmt
        .query_row([room], |row| {
            Ok(RoomRequestRow {
                room: row.get(0)?,
                status: row.get(1)?,
                requested_at: row.get(2)?,
            })
        })
        .optional()?;
    Ok(row)
}

fn map_message(row: &rusqlite::Row<'_>) -> std::result::Result<MessageRow, rusqlite::Error> {
    Ok(MessageRow {
        id: row.get(0)?,
        nickname: row.get(1)?,
        email: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn collect_messages(
    rows: impl Iterator<Item = std::result::Result<MessageRow, rusqlite::Error>>,
) -> Result<Vec<MessageRow>> {
    Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{RegistryDb, RoomStore};

    fn store_with_messages(n: i64) -> RoomStore {
        let store = RoomStore::open_in_memory().unwrap();
        for i in 1..=n {
            store
                .insert_message("nick", "nick@example.com", &format!("message {}", i))
                .unwrap();
        }
        store
    }

    #[test]
    fn message_ids_are_monotonic_from_one() {
        let store = RoomStore::open_in_memory().unwrap();
        for expected in 1..=5 {
            let row = store
                .insert_message("nick", "nick@example.com", "hello")
                .unwrap();
            assert_eq!(row.id, expected);
        }
        assert_eq!(store.count_messages().unwrap(), 5);
    }

    #[test]
    fn deleted_ids_are_not_reused() {
        let store = store_with_messages(3);
        assert!(store.delete_message(3).unwrap());
        let row = store
            .insert_message("nick", "nick@example.com", "after delete")
            .unwrap();
        assert_eq!(row.id, 4);
    }

    #[test]
    fn delete_missing_returns_false() {
        let store = store_with_messages(1);
        assert!(!store.delete_message(99).unwrap());
    }

    #[test]
    fn page_desc_windows() {
        let store = store_with_messages(25);
        let page1 = store.page_desc(10, 0).unwrap();
        let ids: Vec<i64> = page1.iter().map(|m| m.id).collect();
        assert_eq!(ids, (16..=25).rev().collect::<Vec<_>>());

        let page3 = store.page_desc(10, 20).unwrap();
        let ids: Vec<i64> = page3.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn messages_since_is_ascending() {
        let store = store_with_messages(5);
        let rows = store.messages_since(3).unwrap();
        let ids: Vec<i64> = rows.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![4, 5]);
    }

    #[test]
    fn messages_before_slice() {
        let store = store_with_messages(25);
        let rows = store.messages_before(20, 10).unwrap();
        let ids: Vec<i64> = rows.iter().map(|m| m.id).collect();
        assert_eq!(ids, (10..=19).rev().collect::<Vec<_>>());
        assert_eq!(store.count_before(20).unwrap(), 19);
        assert!(store.exists_below(10).unwrap());
        assert!(!store.exists_below(1).unwrap());
    }

    #[test]
    fn heartbeat_upsert_is_last_writer_wins() {
        let store = RoomStore::open_in_memory().unwrap();
        store.upsert_heartbeat("client-a", 100).unwrap();
        store.upsert_heartbeat("client-a", 200).unwrap();
        assert_eq!(store.count_heartbeats_since(150).unwrap(), 1);
        assert_eq!(store.count_heartbeats_since(201).unwrap(), 0);
    }

    #[test]
    fn heartbeat_purge_drops_only_stale_rows() {
        let store = RoomStore::open_in_memory().unwrap();
        store.upsert_heartbeat("old", 100).unwrap();
        store.upsert_heartbeat("fresh", 200).unwrap();
        assert_eq!(store.purge_heartbeats_before(150).unwrap(), 1);
        assert_eq!(store.count_heartbeats_since(0).unwrap(), 1);
    }

    #[test]
    fn room_request_insert_races_resolve_to_one_row() {
        let registry = RegistryDb::open_in_memory().unwrap();
        assert!(registry.insert_room_request("lounge").unwrap());
        assert!(!registry.insert_room_request("lounge").unwrap());

        let row = registry.get_room_request("lounge").unwrap().unwrap();
        assert_eq!(row.status, "pending");
    }

    #[test]
    fn room_status_updates_persist() {
        let registry = RegistryDb::open_in_memory().unwrap();
        registry.insert_room_request("lounge").unwrap();
        registry.set_room_status("lounge", "approved").unwrap();
        let row = registry.get_room_request("lounge").unwrap().unwrap();
        assert_eq!(row.status, "approved");
    }

    #[test]
    fn device_binding_first_confirmation_wins() {
        let registry = RegistryDb::open_in_memory().unwrap();
        registry
            .insert_device_if_absent("dev-1", "first@example.com")
            .unwrap();
        registry
            .insert_device_if_absent("dev-1", "second@example.com")
            .unwrap();

        let row = registry.get_device("dev-1").unwrap().unwrap();
        assert_eq!(row.email, "first@example.com");
        assert!(registry.get_device("dev-2").unwrap().is_none());
    }
}
