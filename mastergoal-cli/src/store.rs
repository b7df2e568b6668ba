//! SQLite-backed session store.
//!
//! One row per profile, so several terminal sessions can keep separate games
//! in the same database file.

use std::path::Path;

use mastergoal_core::error::StoreError;
use mastergoal_core::session::{decode_descriptor, encode_descriptor};
use mastergoal_core::{SessionDescriptor, SessionStore};
use rusqlite::{params, Connection, OptionalExtension};

pub struct SqliteSessionStore {
    conn: Connection,
    profile: String,
}

impl SqliteSessionStore {
    /// Open (or create) the database and make sure the table exists.
    pub fn open(path: &Path, profile: impl Into<String>) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                profile    TEXT PRIMARY KEY,
                descriptor TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(SqliteSessionStore {
            conn,
            profile: profile.into(),
        })
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }
}

fn unavailable(e: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl SessionStore for SqliteSessionStore {
    fn load(&self) -> Result<Option<SessionDescriptor>, StoreError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT descriptor FROM sessions WHERE profile = ?1",
                [&self.profile],
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)?;
        match raw {
            Some(raw) => decode_descriptor(&raw),
            None => Ok(None),
        }
    }

    fn save(&mut self, descriptor: &SessionDescriptor) -> Result<(), StoreError> {
        let raw = encode_descriptor(descriptor)?;
        self.conn
            .execute(
                "INSERT INTO sessions (profile, descriptor, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(profile) DO UPDATE SET descriptor = ?2, updated_at = ?3",
                params![self.profile, raw, unix_now()],
            )
            .map_err(unavailable)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.conn
            .execute("DELETE FROM sessions WHERE profile = ?1", [&self.profile])
            .map_err(unavailable)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mastergoal_core::session::{Cosmetics, DESCRIPTOR_VERSION};
    use mastergoal_core::SessionConfig;

    fn descriptor(id: &str) -> SessionDescriptor {
        SessionDescriptor::new(id.to_string(), SessionConfig::default(), Cosmetics::default())
    }

    #[test]
    fn test_profiles_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let mut alice = SqliteSessionStore::open(&path, "alice").unwrap();
        let mut bob = SqliteSessionStore::open(&path, "bob").unwrap();

        alice.save(&descriptor("g-1")).unwrap();
        assert_eq!(alice.load().unwrap().unwrap().game_id, "g-1");
        assert!(bob.load().unwrap().is_none());

        bob.save(&descriptor("g-2")).unwrap();
        alice.save(&descriptor("g-3")).unwrap();
        assert_eq!(bob.load().unwrap().unwrap().game_id, "g-2");
        assert_eq!(alice.load().unwrap().unwrap().game_id, "g-3");

        alice.clear().unwrap();
        assert!(alice.load().unwrap().is_none());
        assert!(bob.load().unwrap().is_some());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        SqliteSessionStore::open(&path, "default")
            .unwrap()
            .save(&descriptor("g-9"))
            .unwrap();
        let reopened = SqliteSessionStore::open(&path, "default").unwrap();
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded.version, DESCRIPTOR_VERSION);
        assert_eq!(loaded.game_id, "g-9");
    }

    #[test]
    fn test_foreign_version_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let mut store = SqliteSessionStore::open(&path, "default").unwrap();
        let mut old = descriptor("g-0");
        old.version = DESCRIPTOR_VERSION + 7;
        store.save(&old).unwrap();
        assert!(store.load().unwrap().is_none());
    }
}
