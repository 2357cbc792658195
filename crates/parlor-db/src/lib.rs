pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::Result;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Shared registry database: pending room requests and verified devices.
/// One instance serves every room.
pub struct RegistryDb {
    conn: Mutex<Connection>,
}

impl RegistryDb {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run_registry(&conn)?;

        info!("Registry database opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_registry(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("registry lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// Isolated storage unit for one room: its messages and heartbeats.
/// Nothing in here is shared with any other room.
pub struct RoomStore {
    conn: Mutex<Connection>,
}

impl RoomStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run_room(&conn)?;

        debug!("Room store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        migrations::run_room(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("room store lock poisoned: {}", e))?;
        f(&conn)
    }
}

/// Keyed factory over per-room stores. Each room maps to one database
/// file under `<data_dir>/rooms/`; the file's existence is the
/// authoritative signal that the room was approved.
pub struct StoreManager {
    rooms_dir: PathBuf,
    open: Mutex<HashMap<String, Arc<RoomStore>>>,
}

impl StoreManager {
    pub fn new(data_dir: &Path) -> Result<Self> {
        let rooms_dir = data_dir.join("rooms");
        std::fs::create_dir_all(&rooms_dir)?;
        Ok(Self {
            rooms_dir,
            open: Mutex::new(HashMap::new()),
        })
    }

    /// Room names are arbitrary strings; the hex form is filesystem-safe
    /// and injective, so distinct names never collide on one file.
    fn store_path(&self, room: &str) -> PathBuf {
        self.rooms_dir
            .join(format!("{}.db", hex::encode(room.as_bytes())))
    }

    pub fn exists(&self, room: &str) -> bool {
        self.store_path(room).exists()
    }

    /// Opens the room's store, provisioning it on first use. Repeated
    /// calls for the same name share one handle.
    pub fn get_or_create(&self, room: &str) -> Result<Arc<RoomStore>> {
        let mut open = self
            .open
            .lock()
            .map_err(|e| anyhow::anyhow!("store map lock poisoned: {}", e))?;
        if let Some(store) = open.get(room) {
            return Ok(store.clone());
        }
        let store = Arc::new(RoomStore::open(&self.store_path(room))?);
        open.insert(room.to_string(), store.clone());
        Ok(store)
    }

    /// Opens an existing store without provisioning a new one.
    pub fn get_existing(&self, room: &str) -> Result<Option<Arc<RoomStore>>> {
        if !self.exists(room) {
            return Ok(None);
        }
        self.get_or_create(room).map(Some)
    }
}
