//! Typed query helpers for the VaultSync database.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Row};
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;
use crate::models::{NewRepository, RepositoryConfig, SyncAction, SyncRecord};
use crate::provider::Provider;

/// Maximum number of history records returned per repository.
pub const HISTORY_LIMIT: u32 = 10;

fn row_to_repository(row: &Row<'_>) -> Result<RepositoryConfig, rusqlite::Error> {
    let provider_tag: String = row.get(4)?;
    let provider = Provider::from_str_val(&provider_tag).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown provider tag '{provider_tag}'").into(),
        )
    })?;
    let patterns_json: String = row.get(8)?;
    let exclude_patterns: Vec<String> = serde_json::from_str(&patterns_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })?;
    let local_path: String = row.get(3)?;
    Ok(RepositoryConfig {
        id: row.get(0)?,
        name: row.get(1)?,
        remote_url: row.get(2)?,
        local_path: PathBuf::from(local_path),
        provider,
        last_sync_at: row.get(5)?,
        auto_sync: row.get::<_, i64>(6)? != 0,
        sync_interval_minutes: row.get(7)?,
        exclude_patterns,
        created_at: row.get(9)?,
    })
}

const REPO_COLUMNS: &str = "id, name, remote_url, local_path, provider, last_sync_at, \
                            auto_sync, sync_interval_minutes, exclude_patterns, created_at";

impl Database {
    // -- repositories -------------------------------------------------------

    /// Insert a new repository config and return it with its generated id.
    ///
    /// Local-path uniqueness is the caller's invariant; the store does not
    /// enforce it.
    pub fn insert_repository(
        &self,
        new: &NewRepository,
    ) -> Result<RepositoryConfig, DatabaseError> {
        let created_at = Utc::now().to_rfc3339();
        let patterns_json = serde_json::to_string(&new.exclude_patterns)
            .unwrap_or_else(|_| "[]".to_string());
        let conn = self.conn();
        conn.execute(
            "INSERT INTO repositories
                 (name, remote_url, local_path, provider, last_sync_at, auto_sync,
                  sync_interval_minutes, exclude_patterns, created_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7, ?8)",
            params![
                new.name,
                new.remote_url,
                new.local_path.to_string_lossy(),
                new.provider.as_str(),
                new.auto_sync as i64,
                new.sync_interval_minutes,
                patterns_json,
                created_at,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, name = %new.name, "inserted repository");
        Ok(RepositoryConfig {
            id,
            name: new.name.clone(),
            remote_url: new.remote_url.clone(),
            local_path: new.local_path.clone(),
            provider: new.provider,
            last_sync_at: 0,
            auto_sync: new.auto_sync,
            sync_interval_minutes: new.sync_interval_minutes,
            exclude_patterns: new.exclude_patterns.clone(),
            created_at,
        })
    }

    /// Look up a repository by id.
    pub fn get_repository(&self, id: i64) -> Result<Option<RepositoryConfig>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPO_COLUMNS} FROM repositories WHERE id = ?1"
        ))?;
        let mut rows = stmt.query_map(params![id], row_to_repository)?;
        match rows.next() {
            Some(Ok(repo)) => Ok(Some(repo)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Look up a repository by its local path (caller-side uniqueness check).
    pub fn get_repository_by_path(
        &self,
        local_path: &Path,
    ) -> Result<Option<RepositoryConfig>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPO_COLUMNS} FROM repositories WHERE local_path = ?1 LIMIT 1"
        ))?;
        let mut rows = stmt.query_map(params![local_path.to_string_lossy()], row_to_repository)?;
        match rows.next() {
            Some(Ok(repo)) => Ok(Some(repo)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List all repositories, oldest first.
    pub fn list_repositories(&self) -> Result<Vec<RepositoryConfig>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPO_COLUMNS} FROM repositories ORDER BY id ASC"
        ))?;
        let repos = stmt
            .query_map([], row_to_repository)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(repos)
    }

    /// Update a repository's editable settings.
    pub fn update_repository(&self, repo: &RepositoryConfig) -> Result<(), DatabaseError> {
        let patterns_json = serde_json::to_string(&repo.exclude_patterns)
            .unwrap_or_else(|_| "[]".to_string());
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE repositories
             SET name = ?1, remote_url = ?2, local_path = ?3, auto_sync = ?4,
                 sync_interval_minutes = ?5, exclude_patterns = ?6
             WHERE id = ?7",
            params![
                repo.name,
                repo.remote_url,
                repo.local_path.to_string_lossy(),
                repo.auto_sync as i64,
                repo.sync_interval_minutes,
                patterns_json,
                repo.id,
            ],
        )?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "repository".into(),
                id: repo.id.to_string(),
            });
        }
        Ok(())
    }

    /// Enable or disable recurring sync for a repository.
    pub fn set_auto_sync(
        &self,
        id: i64,
        enabled: bool,
        interval_minutes: u32,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE repositories SET auto_sync = ?1, sync_interval_minutes = ?2 WHERE id = ?3",
            params![enabled as i64, interval_minutes, id],
        )?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "repository".into(),
                id: id.to_string(),
            });
        }
        debug!(id, enabled, interval_minutes, "updated auto-sync settings");
        Ok(())
    }

    /// Record a successful push time.
    pub fn touch_last_sync(&self, id: i64, timestamp_millis: i64) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let affected = conn.execute(
            "UPDATE repositories SET last_sync_at = ?1 WHERE id = ?2",
            params![timestamp_millis, id],
        )?;
        if affected == 0 {
            return Err(DatabaseError::NotFound {
                entity: "repository".into(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Delete a repository config and its history. Local files are never
    /// touched.
    pub fn delete_repository(&self, id: i64) -> Result<(), DatabaseError> {
        self.transaction(|conn| {
            conn.execute("DELETE FROM sync_records WHERE repo_id = ?1", params![id])?;
            let affected = conn.execute("DELETE FROM repositories WHERE id = ?1", params![id])?;
            if affected == 0 {
                return Err(DatabaseError::NotFound {
                    entity: "repository".into(),
                    id: id.to_string(),
                });
            }
            Ok(())
        })?;
        debug!(id, "deleted repository config");
        Ok(())
    }

    // -- sync_records -------------------------------------------------------

    /// Append a history record. Records are never updated or deleted
    /// individually.
    pub fn append_sync_record(&self, record: &SyncRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sync_records (id, repo_id, timestamp, action, success, message)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.id,
                record.repo_id,
                record.timestamp,
                record.action.to_string(),
                record.success as i64,
                record.message,
            ],
        )?;
        debug!(
            id = record.id.as_str(),
            repo_id = record.repo_id,
            action = %record.action,
            success = record.success,
            "appended sync record"
        );
        Ok(())
    }

    /// The most recent [`HISTORY_LIMIT`] records for one repository,
    /// newest first.
    pub fn recent_sync_records(&self, repo_id: i64) -> Result<Vec<SyncRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, repo_id, timestamp, action, success, message
             FROM sync_records WHERE repo_id = ?1
             ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
        )?;
        let records = stmt
            .query_map(params![repo_id, HISTORY_LIMIT], |row| {
                let action: String = row.get(3)?;
                Ok(SyncRecord {
                    id: row.get(0)?,
                    repo_id: row.get(1)?,
                    timestamp: row.get(2)?,
                    action: SyncAction::from_str_val(&action),
                    success: row.get::<_, i64>(4)? != 0,
                    message: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn sample_repo(path: &str) -> NewRepository {
        NewRepository {
            name: "notes".into(),
            remote_url: "https://github.com/me/notes.git".into(),
            local_path: PathBuf::from(path),
            provider: Provider::GitHub,
            auto_sync: false,
            sync_interval_minutes: 30,
            exclude_patterns: vec![".trash/**".into()],
        }
    }

    #[test]
    fn test_insert_and_get_repository() {
        let db = test_db();
        let repo = db.insert_repository(&sample_repo("/vaults/notes")).unwrap();
        assert!(repo.id > 0);
        assert_eq!(repo.last_sync_at, 0);

        let loaded = db.get_repository(repo.id).unwrap().unwrap();
        assert_eq!(loaded.name, "notes");
        assert_eq!(loaded.provider, Provider::GitHub);
        assert_eq!(loaded.exclude_patterns, vec![".trash/**".to_string()]);
        assert_eq!(loaded.local_path, PathBuf::from("/vaults/notes"));
    }

    #[test]
    fn test_get_missing_repository() {
        let db = test_db();
        assert!(db.get_repository(99).unwrap().is_none());
    }

    #[test]
    fn test_get_repository_by_path() {
        let db = test_db();
        db.insert_repository(&sample_repo("/vaults/notes")).unwrap();
        assert!(db
            .get_repository_by_path(Path::new("/vaults/notes"))
            .unwrap()
            .is_some());
        assert!(db
            .get_repository_by_path(Path::new("/vaults/other"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_update_repository_settings() {
        let db = test_db();
        let mut repo = db.insert_repository(&sample_repo("/vaults/notes")).unwrap();
        repo.name = "work-notes".into();
        repo.auto_sync = true;
        repo.sync_interval_minutes = 15;
        repo.exclude_patterns.push("*.tmp".into());
        db.update_repository(&repo).unwrap();

        let loaded = db.get_repository(repo.id).unwrap().unwrap();
        assert_eq!(loaded.name, "work-notes");
        assert!(loaded.auto_sync);
        assert_eq!(loaded.sync_interval_minutes, 15);
        assert_eq!(loaded.exclude_patterns.len(), 2);
    }

    #[test]
    fn test_set_auto_sync() {
        let db = test_db();
        let repo = db.insert_repository(&sample_repo("/vaults/notes")).unwrap();
        db.set_auto_sync(repo.id, true, 15).unwrap();

        let loaded = db.get_repository(repo.id).unwrap().unwrap();
        assert!(loaded.auto_sync);
        assert_eq!(loaded.sync_interval_minutes, 15);

        let err = db.set_auto_sync(999, true, 15).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn test_touch_last_sync() {
        let db = test_db();
        let repo = db.insert_repository(&sample_repo("/vaults/notes")).unwrap();
        db.touch_last_sync(repo.id, 1_700_000_000_000).unwrap();
        let loaded = db.get_repository(repo.id).unwrap().unwrap();
        assert_eq!(loaded.last_sync_at, 1_700_000_000_000);
    }

    #[test]
    fn test_delete_repository_removes_history() {
        let db = test_db();
        let repo = db.insert_repository(&sample_repo("/vaults/notes")).unwrap();
        db.append_sync_record(&SyncRecord::now(repo.id, SyncAction::Sync, true, "ok"))
            .unwrap();
        db.delete_repository(repo.id).unwrap();

        assert!(db.get_repository(repo.id).unwrap().is_none());
        assert!(db.recent_sync_records(repo.id).unwrap().is_empty());

        let err = db.delete_repository(repo.id).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn test_history_bounded_to_ten_newest_first() {
        let db = test_db();
        let repo = db.insert_repository(&sample_repo("/vaults/notes")).unwrap();

        for i in 0..25 {
            let record = SyncRecord {
                id: uuid::Uuid::new_v4().to_string(),
                repo_id: repo.id,
                timestamp: 1_000 + i,
                action: SyncAction::Sync,
                success: i % 2 == 0,
                message: format!("cycle {i}"),
            };
            db.append_sync_record(&record).unwrap();
        }

        let records = db.recent_sync_records(repo.id).unwrap();
        assert_eq!(records.len(), HISTORY_LIMIT as usize);
        assert_eq!(records[0].message, "cycle 24");
        assert_eq!(records[9].message, "cycle 15");
        for pair in records.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[test]
    fn test_history_is_per_repository() {
        let db = test_db();
        let a = db.insert_repository(&sample_repo("/vaults/a")).unwrap();
        let b = db.insert_repository(&sample_repo("/vaults/b")).unwrap();

        db.append_sync_record(&SyncRecord::now(a.id, SyncAction::Pull, true, "a"))
            .unwrap();
        db.append_sync_record(&SyncRecord::now(b.id, SyncAction::Push, false, "b"))
            .unwrap();

        let records_a = db.recent_sync_records(a.id).unwrap();
        assert_eq!(records_a.len(), 1);
        assert_eq!(records_a[0].action, SyncAction::Pull);

        let records_b = db.recent_sync_records(b.id).unwrap();
        assert_eq!(records_b.len(), 1);
        assert!(!records_b[0].success);
    }
}
