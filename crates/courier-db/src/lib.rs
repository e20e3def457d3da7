pub mod migrations;
pub mod models;
pub mod queries;
pub mod seed;

use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is not open")]
    NotOpen,

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

enum Location {
    File(PathBuf),
    Memory,
}

/// Message store backed by a single SQLite connection.
///
/// The handle starts closed. [`Database::initialize`] opens it, creates the
/// schema and seeds an empty store; [`Database::close`] releases it again.
pub struct Database {
    location: Location,
    conn: Mutex<Option<Connection>>,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            location: Location::File(path.into()),
            conn: Mutex::new(None),
        }
    }

    /// A private in-memory store. Contents vanish on close.
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: Mutex::new(None),
        }
    }

    /// Open (if needed), migrate and seed. Safe to call repeatedly: an
    /// already-seeded store is left untouched.
    pub fn initialize(&self) -> Result<()> {
        let mut guard = self.lock()?;

        if guard.is_none() {
            *guard = Some(self.connect()?);
        }
        let Some(conn) = guard.as_mut() else {
            return Err(StoreError::NotOpen);
        };

        migrations::run(conn)?;
        seed::seed_if_empty(conn, &mut rand::rng(), chrono::Utc::now().timestamp_millis())?;
        Ok(())
    }

    /// Release the connection. No-op if never opened or already closed.
    pub fn close(&self) {
        let mut guard = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(conn) = guard.take() {
            match conn.close() {
                Ok(()) => info!("Database closed"),
                Err((_, e)) => warn!("Database close failed: {}", e),
            }
        }
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let guard = self.lock()?;
        let conn = guard.as_ref().ok_or(StoreError::NotOpen)?;
        f(conn)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Connection>>> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = match &self.location {
            Location::File(path) => Connection::open(path)?,
            Location::Memory => Connection::open_in_memory()?,
        };

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        match &self.location {
            Location::File(path) => info!("Database opened at {}", path.display()),
            Location::Memory => info!("Database opened in memory"),
        }
        Ok(conn)
    }
}
