//! Note repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Upsert notes by title with partial vs full content semantics.
//! - Rename, look up, and page/search notes.
//!
//! # Invariants
//! - Exactly one row per title; rename never merges or overwrites rows.
//! - `created_at` is written once, on insert.
//! - An upsert without content never changes stored content.
//! - List order is `updated_at DESC, title ASC`.

use crate::db::ConnectionProvider;
use crate::model::note::{Note, NoteListQuery, NotePage};
use crate::model::timestamp::{normalize_timestamp, now_timestamp};
use crate::repo::{RepoError, RepoResult};
use log::{debug, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, TransactionBehavior};
use std::time::Instant;

const NOTE_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    created_at,
    updated_at
FROM notes";

/// Repository interface for note operations.
pub trait NoteRepository {
    /// Creates the note or updates it in place.
    ///
    /// `Some(content)` replaces content (an empty string clears it);
    /// `None` only refreshes `updated_at` on an existing note.
    fn upsert_note(&self, title: &str, content: Option<&str>) -> RepoResult<Note>;
    /// Moves a note to a new title.
    fn rename_note(&self, old_title: &str, new_title: &str) -> RepoResult<Note>;
    /// Gets one note by exact title.
    fn get_note(&self, title: &str) -> RepoResult<Note>;
    /// Lists one page of notes, optionally filtered by substring.
    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<NotePage>;
}

/// SQLite-backed note repository.
#[derive(Debug, Clone)]
pub struct SqliteNoteRepository {
    connections: ConnectionProvider,
}

impl SqliteNoteRepository {
    /// Constructs a repository over a migrated store.
    pub fn try_new(connections: ConnectionProvider) -> RepoResult<Self> {
        let conn = connections.connect()?;
        ensure_note_connection_ready(&conn)?;
        Ok(Self { connections })
    }
}

impl NoteRepository for SqliteNoteRepository {
    fn upsert_note(&self, title: &str, content: Option<&str>) -> RepoResult<Note> {
        let started_at = Instant::now();
        let mut conn = self.connections.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = now_timestamp();

        let changed = match content {
            Some(content) => tx.execute(
                "UPDATE notes
                 SET content = ?2, updated_at = ?3
                 WHERE title = ?1;",
                params![title, content, now],
            )?,
            None => tx.execute(
                "UPDATE notes
                 SET updated_at = ?2
                 WHERE title = ?1;",
                params![title, now],
            )?,
        };

        let created = changed == 0;
        if created {
            tx.execute(
                "INSERT INTO notes (title, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3);",
                params![title, content.unwrap_or(""), now],
            )?;
        }

        let note = load_note(&tx, title)?.ok_or_else(|| {
            RepoError::InvalidData("upserted note missing in read-back".to_string())
        })?;
        tx.commit()?;

        info!(
            "event=note_upsert module=repo status=ok created={} content_provided={} duration_ms={}",
            created,
            content.is_some(),
            started_at.elapsed().as_millis()
        );
        Ok(note)
    }

    fn rename_note(&self, old_title: &str, new_title: &str) -> RepoResult<Note> {
        let started_at = Instant::now();
        let mut conn = self.connections.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = match tx.execute(
            "UPDATE notes
             SET title = ?2, updated_at = ?3
             WHERE title = ?1;",
            params![old_title, new_title, now_timestamp()],
        ) {
            Ok(changed) => changed,
            Err(err) if is_unique_violation(&err) => {
                info!("event=note_rename module=repo status=conflict");
                return Err(RepoError::Conflict {
                    title: new_title.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        if changed == 0 {
            info!("event=note_rename module=repo status=not_found");
            return Err(RepoError::NotFound(old_title.to_string()));
        }

        let note = load_note(&tx, new_title)?.ok_or_else(|| {
            RepoError::InvalidData("renamed note missing in read-back".to_string())
        })?;
        tx.commit()?;

        info!(
            "event=note_rename module=repo status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(note)
    }

    fn get_note(&self, title: &str) -> RepoResult<Note> {
        let conn = self.connections.connect()?;
        let note = load_note(&conn, title)?;
        debug!(
            "event=note_get module=repo status={}",
            if note.is_some() { "ok" } else { "not_found" }
        );
        note.ok_or_else(|| RepoError::NotFound(title.to_string()))
    }

    fn list_notes(&self, query: &NoteListQuery) -> RepoResult<NotePage> {
        let started_at = Instant::now();
        let page = query.normalized_page();
        let page_size = query.normalized_page_size();
        let offset = (page - 1).saturating_mul(page_size);

        let mut filter_sql = String::new();
        let mut bind_values: Vec<Value> = Vec::new();
        if let Some(text) = query.search_text() {
            filter_sql.push_str(" WHERE title LIKE ?1 ESCAPE '\\' OR content LIKE ?1 ESCAPE '\\'");
            bind_values.push(Value::Text(like_pattern(text)));
        }

        let mut conn = self.connections.connect()?;
        let tx = conn.transaction()?;

        let total: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM notes{filter_sql};"),
            params_from_iter(bind_values.iter()),
            |row| row.get(0),
        )?;
        let total = u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative note count {total}")))?;

        let limit_index = bind_values.len() + 1;
        let sql = format!(
            "{NOTE_SELECT_SQL}{filter_sql}
             ORDER BY updated_at DESC, title ASC
             LIMIT ?{limit_index} OFFSET ?{};",
            limit_index + 1
        );
        bind_values.push(Value::Integer(page_size));
        bind_values.push(Value::Integer(offset));

        let notes = {
            let mut stmt = tx.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values.iter()))?;
            let mut notes = Vec::new();
            while let Some(row) = rows.next()? {
                notes.push(note_from_row(row)?);
            }
            notes
        };
        tx.commit()?;

        debug!(
            "event=note_list module=repo status=ok filtered={} page={} page_size={} returned={} total={} duration_ms={}",
            query.search_text().is_some(),
            page,
            page_size,
            notes.len(),
            total,
            started_at.elapsed().as_millis()
        );

        Ok(NotePage {
            notes,
            total,
            page,
            page_size,
        })
    }
}

/// Escapes LIKE wildcards so `text` matches as a literal substring.
pub fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for ch in text.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

fn load_note(conn: &Connection, title: &str) -> RepoResult<Option<Note>> {
    let note = conn
        .query_row(
            &format!("{NOTE_SELECT_SQL} WHERE title = ?1;"),
            [title],
            note_from_row,
        )
        .optional()?;
    Ok(note)
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get("id")?,
        title: row.get("title")?,
        content: row.get("content")?,
        created_at: timestamp_from_value(row.get("created_at")?),
        updated_at: timestamp_from_value(row.get("updated_at")?),
    })
}

fn timestamp_from_value(value: Value) -> String {
    let raw = match value {
        Value::Text(text) => text,
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    };
    normalize_timestamp(&raw)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn ensure_note_connection_ready(conn: &Connection) -> RepoResult<()> {
    if !table_exists(conn, "notes")? {
        return Err(RepoError::MissingRequiredTable("notes"));
    }

    for column in ["id", "title", "content", "created_at", "updated_at"] {
        if !table_has_column(conn, "notes", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "notes",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
