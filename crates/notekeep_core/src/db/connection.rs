//! Per-operation SQLite connection provider.
//!
//! # Responsibility
//! - Resolve the storage file from explicit configuration.
//! - Open and configure one connection per repository/migration call.
//!
//! # Invariants
//! - Connections are never cached; callers drop them when the call returns.
//! - Returned connections carry a busy timeout so concurrent writers serialize.

use super::{DbError, DbResult};
use crate::config::StoreConfig;
use log::{debug, error};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Hands out fresh connections to a single SQLite file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionProvider {
    database_path: PathBuf,
}

impl ConnectionProvider {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.database_path())
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    /// Opens a connection scoped to one operation.
    ///
    /// # Side effects
    /// - Creates the database file when it does not exist yet.
    /// - Emits `db_connect` debug events, and an error event on failure.
    pub fn connect(&self) -> DbResult<Connection> {
        let started_at = Instant::now();

        let conn = Connection::open_with_flags(
            &self.database_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .and_then(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(conn)
        });

        match conn {
            Ok(conn) => {
                debug!(
                    "event=db_connect module=db status=ok path={} duration_ms={}",
                    self.database_path.display(),
                    started_at.elapsed().as_millis()
                );
                Ok(conn)
            }
            Err(err) => {
                error!(
                    "event=db_connect module=db status=error path={} duration_ms={} error_code=db_open_failed error={}",
                    self.database_path.display(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err.into())
            }
        }
    }

    /// Creates the directory holding the database file if it is missing.
    pub fn ensure_parent_dir(&self) -> DbResult<()> {
        let Some(parent) = self.database_path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() || parent.exists() {
            return Ok(());
        }
        std::fs::create_dir_all(parent).map_err(|source| DbError::Io {
            path: parent.to_path_buf(),
            source,
        })
    }
}
