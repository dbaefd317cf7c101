//! Core persistence for notekeep.
//! Notes are keyed by unique title and stored in a migrated SQLite file.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use config::{ConfigError, StoreConfig};
pub use db::{ConnectionProvider, DbError, DbResult, Migration, MigrationReport, MigrationRunner};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::note::{Note, NoteListQuery, NotePage, DEFAULT_PAGE_SIZE};
pub use model::timestamp::{normalize_timestamp, parse_timestamp};
pub use repo::note_repo::{NoteRepository, SqliteNoteRepository};
pub use repo::{RepoError, RepoResult};

/// Migrates the configured store and returns a repository over it.
///
/// A migration failure is returned as a fatal `DbError`; no repository is
/// handed out for a partially migrated store.
pub fn open_store(config: &StoreConfig) -> RepoResult<(SqliteNoteRepository, MigrationReport)> {
    let connections = ConnectionProvider::from_config(config);
    let report = MigrationRunner::new(connections.clone()).apply_all()?;
    let repo = SqliteNoteRepository::try_new(connections)?;
    Ok((repo, report))
}
