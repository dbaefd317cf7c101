//! SQLite storage bootstrap and schema migration entry points.
//!
//! # Responsibility
//! - Hand out per-operation SQLite connections for the configured store.
//! - Apply schema migrations in deterministic numeric order.
//!
//! # Invariants
//! - Applied migration versions are tracked in the `schema_migrations` ledger.
//! - Core code must not read/write notes before migrations succeed.
//! - A `MigrationFailed` error is fatal for startup.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod connection;
pub mod migrations;

pub use connection::ConnectionProvider;
pub use migrations::{Migration, MigrationReport, MigrationRunner};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    InvalidMigrationRegistry(String),
    /// A migration script failed; its version was not recorded.
    MigrationFailed {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

impl DbError {
    /// Returns whether the error must abort process startup.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MigrationFailed { .. }
                | Self::UnsupportedSchemaVersion { .. }
                | Self::InvalidMigrationRegistry(_)
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Io { path, source } => {
                write!(f, "storage path `{}` is unusable: {source}", path.display())
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::InvalidMigrationRegistry(message) => {
                write!(f, "invalid migration registry: {message}")
            }
            Self::MigrationFailed {
                version,
                name,
                source,
            } => write!(f, "migration {version} ({name}) failed: {source}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::MigrationFailed { source, .. } => Some(source),
            Self::UnsupportedSchemaVersion { .. } | Self::InvalidMigrationRegistry(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
