//! Database schema definitions and migration runner.
//!
//! Migrations are plain SQL strings applied in order; the SQLite
//! `user_version` pragma tracks which have already been applied.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// All migrations, in order. Each entry is `(version, description, sql)`.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "initial schema",
        r#"
        CREATE TABLE IF NOT EXISTS repositories (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            name                    TEXT    NOT NULL,
            remote_url              TEXT    NOT NULL,
            local_path              TEXT    NOT NULL,
            provider                TEXT    NOT NULL CHECK (provider IN ('github', 'gitee')),
            last_sync_at            INTEGER NOT NULL DEFAULT 0,
            auto_sync               INTEGER NOT NULL DEFAULT 0,
            sync_interval_minutes   INTEGER NOT NULL DEFAULT 30,
            created_at              TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_repositories_local_path ON repositories (local_path);

        CREATE TABLE IF NOT EXISTS sync_records (
            id          TEXT PRIMARY KEY,
            repo_id     INTEGER NOT NULL REFERENCES repositories (id) ON DELETE CASCADE,
            timestamp   INTEGER NOT NULL,
            action      TEXT    NOT NULL CHECK (action IN ('pull', 'push', 'sync')),
            success     INTEGER NOT NULL,
            message     TEXT    NOT NULL DEFAULT ''
        );

        CREATE INDEX IF NOT EXISTS idx_sync_records_repo_time
            ON sync_records (repo_id, timestamp DESC);
        "#,
    ),
    (
        2,
        "per-repository exclusion patterns",
        r#"
        ALTER TABLE repositories ADD COLUMN exclude_patterns TEXT NOT NULL DEFAULT '[]';
        "#,
    ),
];

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_schema_version(conn)?;
    info!(
        current_version,
        target_version = MIGRATIONS.last().map(|m| m.0).unwrap_or(0),
        "checking database migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            set_schema_version(conn, version)?;
            debug!(version, "migration applied");
        }
    }

    Ok(())
}

/// Read the current schema version from the SQLite `user_version` pragma.
fn get_schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version via the SQLite `user_version` pragma.
fn set_schema_version(conn: &Connection, version: u32) -> Result<(), DatabaseError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}
