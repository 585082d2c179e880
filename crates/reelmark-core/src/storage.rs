use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ReelmarkError;
use crate::models::{AuthSession, Rating, RecordKey, ViewingEvent, WatchRecord};
use crate::orchestrator::{self, UpsertOutcome};

const SCHEMA_V1: &str = include_str!("../../../migrations/001_kv_store.sql");

/// Storage key holding the watch list.
pub const WATCHED_KEY: &str = "watchedMovies";
/// Storage key holding the signed-in session.
pub const SESSION_KEY: &str = "authSession";

/// SQLite-backed key/value store with JSON values.
pub struct Storage {
    conn: Connection,
}

impl Storage {
    /// Open (or create) the database at the given path and run migrations.
    pub fn open(path: &Path) -> Result<Self, ReelmarkError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, ReelmarkError> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self { conn })
    }

    // ── Raw key/value ───────────────────────────────────────────

    /// Read and decode the value under `key`.
    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, ReelmarkError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Encode and store `value` under `key`, replacing any previous value.
    pub fn set_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), ReelmarkError> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, json],
        )?;
        Ok(())
    }

    pub fn remove_value(&self, key: &str) -> Result<(), ReelmarkError> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Watch records ───────────────────────────────────────────

    /// All watch records, in insertion order.
    pub fn watched_records(&self) -> Result<Vec<WatchRecord>, ReelmarkError> {
        Ok(self.get_value(WATCHED_KEY)?.unwrap_or_default())
    }

    pub fn save_watched_records(&self, records: &[WatchRecord]) -> Result<(), ReelmarkError> {
        self.set_value(WATCHED_KEY, records)
    }

    /// The record for `key`, if any.
    pub fn record(&self, key: &RecordKey) -> Result<Option<WatchRecord>, ReelmarkError> {
        Ok(self
            .watched_records()?
            .into_iter()
            .find(|r| r.matches(key)))
    }

    /// Upsert a viewing keyed by (title, platform).
    pub fn record_viewing(
        &self,
        event: &ViewingEvent,
    ) -> Result<(UpsertOutcome, WatchRecord), ReelmarkError> {
        let mut records = self.watched_records()?;
        let result = orchestrator::apply_viewing(&mut records, event);
        self.save_watched_records(&records)?;
        Ok(result)
    }

    /// Fill a missing cover (and year). Returns the record if it changed.
    pub fn backfill_cover(
        &self,
        key: &RecordKey,
        cover_url: Option<&str>,
        release_year: Option<&str>,
    ) -> Result<Option<WatchRecord>, ReelmarkError> {
        let mut records = self.watched_records()?;
        let updated = orchestrator::apply_cover(&mut records, key, cover_url, release_year);
        if updated.is_some() {
            self.save_watched_records(&records)?;
        }
        Ok(updated)
    }

    /// Remember the server-assigned id for `key`. Returns whether a record matched.
    pub fn set_remote_id(&self, key: &RecordKey, remote_id: &str) -> Result<bool, ReelmarkError> {
        let mut records = self.watched_records()?;
        let Some(record) = records.iter_mut().find(|r| r.matches(key)) else {
            return Ok(false);
        };
        record.remote_id = Some(remote_id.to_string());
        self.save_watched_records(&records)?;
        Ok(true)
    }

    /// Set or clear the rating on `key`.
    pub fn set_rating(
        &self,
        key: &RecordKey,
        rating: Option<Rating>,
    ) -> Result<WatchRecord, ReelmarkError> {
        let mut records = self.watched_records()?;
        let record = records
            .iter_mut()
            .find(|r| r.matches(key))
            .ok_or_else(|| ReelmarkError::NotFound(key.to_string()))?;
        record.rating = rating;
        let updated = record.clone();
        self.save_watched_records(&records)?;
        Ok(updated)
    }

    /// Remove the record for `key`, returning it.
    pub fn delete_record(&self, key: &RecordKey) -> Result<Option<WatchRecord>, ReelmarkError> {
        let mut records = self.watched_records()?;
        let Some(pos) = records.iter().position(|r| r.matches(key)) else {
            return Ok(None);
        };
        let removed = records.remove(pos);
        self.save_watched_records(&records)?;
        Ok(Some(removed))
    }

    /// Empty the watch list.
    pub fn clear_records(&self) -> Result<(), ReelmarkError> {
        self.save_watched_records(&[])
    }

    // ── Auth session ────────────────────────────────────────────

    pub fn auth_session(&self) -> Result<Option<AuthSession>, ReelmarkError> {
        self.get_value(SESSION_KEY)
    }

    pub fn save_auth_session(&self, session: &AuthSession) -> Result<(), ReelmarkError> {
        self.set_value(SESSION_KEY, session)
    }

    pub fn clear_auth_session(&self) -> Result<(), ReelmarkError> {
        self.remove_value(SESSION_KEY)
    }
}

// ── Migrations ──────────────────────────────────────────────────

fn run_migrations(conn: &Connection) -> Result<(), ReelmarkError> {
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        conn.execute_batch(SCHEMA_V1)?;
        conn.pragma_update(None, "user_version", 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::models::{Platform, SessionUser};

    fn viewing(title: &str, platform: Platform) -> ViewingEvent {
        ViewingEvent::now(title, platform, Some(format!("https://example.test/{title}")))
    }

    #[test]
    fn test_empty_store() {
        let db = Storage::open_memory().unwrap();
        assert!(db.watched_records().unwrap().is_empty());
        assert!(db.auth_session().unwrap().is_none());
    }

    #[test]
    fn test_record_viewing_upserts() {
        let db = Storage::open_memory().unwrap();
        let first = viewing("Dark", Platform::Netflix);
        let (outcome, _) = db.record_viewing(&first).unwrap();
        assert!(outcome.is_new());

        let mut second = viewing("Dark", Platform::Netflix);
        second.at = first.at + Duration::minutes(30);
        let (outcome, record) = db.record_viewing(&second).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { view_count: 2 });
        assert_eq!(record.last_watched_at, second.at);

        let stored = db.watched_records().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].view_count, 2);
        assert_eq!(stored[0].first_watched_at, first.at);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelmark.db");
        {
            let db = Storage::open(&path).unwrap();
            db.record_viewing(&viewing("Andor", Platform::Disney)).unwrap();
        }
        let db = Storage::open(&path).unwrap();
        let records = db.watched_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].platform, Platform::Disney);
    }

    #[test]
    fn test_cover_remote_id_and_rating() {
        let db = Storage::open_memory().unwrap();
        db.record_viewing(&viewing("Dark", Platform::Netflix)).unwrap();
        let key = RecordKey::new("Dark", Platform::Netflix);

        let updated = db
            .backfill_cover(&key, Some("https://img/dark.jpg"), Some("2017"))
            .unwrap();
        assert!(updated.is_some());
        assert!(db.backfill_cover(&key, Some("https://img/other.jpg"), None).unwrap().is_none());

        assert!(db.set_remote_id(&key, "42").unwrap());
        assert!(!db
            .set_remote_id(&RecordKey::new("Nope", Platform::Netflix), "1")
            .unwrap());

        let rated = db.set_rating(&key, Some(Rating::new(5).unwrap())).unwrap();
        assert!(rated.is_favorite());

        let record = db.record(&key).unwrap().unwrap();
        assert_eq!(record.cover_url.as_deref(), Some("https://img/dark.jpg"));
        assert_eq!(record.remote_id.as_deref(), Some("42"));
        assert_eq!(record.rating.map(Rating::value), Some(5));
    }

    #[test]
    fn test_rating_missing_record() {
        let db = Storage::open_memory().unwrap();
        let err = db
            .set_rating(&RecordKey::new("Ghost", Platform::Hbo), None)
            .unwrap_err();
        assert!(matches!(err, ReelmarkError::NotFound(_)));
    }

    #[test]
    fn test_delete_and_clear() {
        let db = Storage::open_memory().unwrap();
        db.record_viewing(&viewing("Dark", Platform::Netflix)).unwrap();
        db.record_viewing(&viewing("Reacher", Platform::Prime)).unwrap();

        let removed = db
            .delete_record(&RecordKey::new("Dark", Platform::Netflix))
            .unwrap();
        assert_eq!(removed.unwrap().title, "Dark");
        assert_eq!(db.watched_records().unwrap().len(), 1);

        db.clear_records().unwrap();
        assert!(db.watched_records().unwrap().is_empty());
    }

    #[test]
    fn test_auth_session_roundtrip() {
        let db = Storage::open_memory().unwrap();
        let session = AuthSession {
            access_token: "abc".into(),
            refresh_token: None,
            user: SessionUser {
                id: "user-1".into(),
                email: Some("me@example.com".into()),
            },
            established_at: Utc::now(),
        };
        db.save_auth_session(&session).unwrap();
        assert_eq!(db.auth_session().unwrap().unwrap(), session);

        db.clear_auth_session().unwrap();
        assert!(db.auth_session().unwrap().is_none());
    }
}
