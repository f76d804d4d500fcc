//! SQLite store for mailbox configs and the attachment records written by
//! retrieval passes.
//!
//! A record references its mailbox through a foreign key, so every
//! connection is opened with `foreign_keys` on. Writes from a pass are
//! single-row inserts; two `mailpdf fetch` processes running at once wait
//! on each other through the busy timeout instead of failing.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod attachment_repo;
pub mod error;
pub mod mailbox_repo;
pub mod migrations;

pub use error::DatabaseError;

/// How long an insert waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the metadata store.
///
/// Clones share one connection; backends persisting attachments
/// concurrently take turns on the inner lock.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the store at `path`, creating its directory and schema on
    /// first use.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let db = Self::prepare(Connection::open(path)?)?;
        log::debug!("Metadata store ready at {}", path.display());
        Ok(db)
    }

    /// A private store that disappears with the handle.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, DatabaseError> {
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::run_all(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// `~/.mailpdf/data/mailpdf.db`, used when the settings name no database.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".mailpdf").join("data").join("mailpdf.db"))
}
