//! SQLite migration registry and ledger-backed executor.
//!
//! # Responsibility
//! - Register schema migrations as an explicit, numerically ordered list.
//! - Apply each pending migration in its own transaction and record it in
//!   the `schema_migrations` ledger.
//!
//! # Invariants
//! - Ordering is by numeric `version`, never by name.
//! - A recorded version is never reapplied or removed.
//! - A failing migration is not recorded and stops the run.

use super::connection::ConnectionProvider;
use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);";

/// One schema change step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Positive, unique version number.
    pub version: u32,
    /// Descriptive name, used in logs and errors.
    pub name: &'static str,
    /// SQL batch executed inside the migration transaction.
    pub sql: &'static str,
}

/// Built-in migrations shipped with this binary.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_notes",
        sql: include_str!("0001_create_notes.sql"),
    },
    Migration {
        version: 2,
        name: "notes_updated_at_index",
        sql: include_str!("0002_notes_updated_at_index.sql"),
    },
];

/// Outcome of one `apply_all` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Ledger version before the run.
    pub from_version: u32,
    /// Ledger version after the run.
    pub to_version: u32,
    /// Versions applied by this run, ascending.
    pub applied: Vec<u32>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies registered migrations to the store behind a connection provider.
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    connections: ConnectionProvider,
    migrations: Vec<Migration>,
}

impl MigrationRunner {
    /// Creates a runner over the built-in migrations.
    pub fn new(connections: ConnectionProvider) -> Self {
        Self::with_migrations(connections, MIGRATIONS)
    }

    /// Creates a runner over a caller-provided registry.
    ///
    /// The registry may be given in any order; it is sorted by version.
    pub fn with_migrations(connections: ConnectionProvider, migrations: &[Migration]) -> Self {
        let mut migrations = migrations.to_vec();
        migrations.sort_by_key(|migration| migration.version);
        Self {
            connections,
            migrations,
        }
    }

    pub fn migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// Highest version known to this runner, or 0 for an empty registry.
    pub fn latest_version(&self) -> u32 {
        self.migrations
            .last()
            .map_or(0, |migration| migration.version)
    }

    /// Brings the store up to the latest registered version.
    ///
    /// # Errors
    /// - `InvalidMigrationRegistry` for duplicate or zero versions.
    /// - `UnsupportedSchemaVersion` when the ledger is ahead of the registry.
    /// - `MigrationFailed` when a migration's SQL or its commit fails; later
    ///   migrations are not attempted.
    pub fn apply_all(&self) -> DbResult<MigrationReport> {
        let started_at = Instant::now();
        info!(
            "event=db_migrate module=db status=start path={}",
            self.connections.database_path().display()
        );

        let result = validate_registry(&self.migrations)
            .and_then(|()| self.connections.ensure_parent_dir())
            .and_then(|()| self.connections.connect())
            .and_then(|mut conn| apply_sorted(&mut conn, &self.migrations));

        match &result {
            Ok(report) => info!(
                "event=db_migrate module=db status=ok from_version={} to_version={} applied={} duration_ms={}",
                report.from_version,
                report.to_version,
                report.applied.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=db_migrate module=db status=error fatal={} duration_ms={} error={}",
                err.is_fatal(),
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }
}

/// Returns the latest built-in migration version.
pub fn latest_version() -> u32 {
    MIGRATIONS
        .iter()
        .map(|migration| migration.version)
        .max()
        .unwrap_or(0)
}

/// Reads the highest recorded version, 0 when the ledger is empty or absent.
pub fn current_version(conn: &Connection) -> DbResult<u32> {
    conn.execute_batch(LEDGER_DDL)?;
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations;",
        [],
        |row| row.get::<_, u32>(0),
    )?;
    Ok(version)
}

/// Lists every recorded ledger version, ascending.
pub fn applied_versions(conn: &Connection) -> DbResult<Vec<u32>> {
    conn.execute_batch(LEDGER_DDL)?;
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version ASC;")?;
    let mut rows = stmt.query([])?;
    let mut versions = Vec::new();
    while let Some(row) = rows.next()? {
        versions.push(row.get(0)?);
    }
    Ok(versions)
}

fn apply_sorted(conn: &mut Connection, migrations: &[Migration]) -> DbResult<MigrationReport> {
    let from_version = current_version(conn)?;
    let latest = migrations.last().map_or(0, |migration| migration.version);

    if from_version > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from_version,
            latest_supported: latest,
        });
    }

    let mut applied = Vec::new();
    for migration in migrations {
        if migration.version <= from_version {
            continue;
        }

        let tx = conn.transaction()?;
        let staged = tx.execute_batch(migration.sql).and_then(|()| {
            tx.execute(
                "INSERT INTO schema_migrations (version) VALUES (?1);",
                [migration.version],
            )
            .map(|_| ())
        });
        // A failed commit rolls back on drop and counts as a failed migration.
        let outcome = match staged {
            Ok(()) => tx.commit(),
            Err(err) => Err(err),
        };
        if let Err(source) = outcome {
            error!(
                "event=db_migrate_step module=db status=error version={} name={} error={}",
                migration.version, migration.name, source
            );
            return Err(DbError::MigrationFailed {
                version: migration.version,
                name: migration.name,
                source,
            });
        }

        info!(
            "event=db_migrate_step module=db status=ok version={} name={}",
            migration.version, migration.name
        );
        applied.push(migration.version);
    }

    Ok(MigrationReport {
        from_version,
        to_version: applied.last().copied().unwrap_or(from_version),
        applied,
    })
}

fn validate_registry(sorted: &[Migration]) -> DbResult<()> {
    if let Some(first) = sorted.first() {
        if first.version == 0 {
            return Err(DbError::InvalidMigrationRegistry(format!(
                "migration `{}` uses reserved version 0",
                first.name
            )));
        }
    }
    for pair in sorted.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(DbError::InvalidMigrationRegistry(format!(
                "version {} is registered by both `{}` and `{}`",
                pair[0].version, pair[0].name, pair[1].name
            )));
        }
    }
    Ok(())
}
