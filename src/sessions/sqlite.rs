use super::store::SessionStore;
use super::types::{
    EntryMeta, EntryRole, PendingDecision, Session, SessionContext, TranscriptEntry,
};
use crate::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;

/// Durable session store backed by SQLite.
///
/// Context and pending-decision records are stored as JSON columns so the
/// schema does not chase every field addition; the transcript table is
/// append-only and ordered by insertion rowid.
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
}

impl SqliteSessionStore {
    pub fn new(db_path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path).map_err(unavailable)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             CREATE TABLE IF NOT EXISTS sessions (
                 id TEXT PRIMARY KEY,
                 created_at TEXT NOT NULL,
                 caller_id TEXT,
                 context TEXT NOT NULL,
                 pending TEXT
             );

             CREATE TABLE IF NOT EXISTS transcript (
                 seq INTEGER PRIMARY KEY AUTOINCREMENT,
                 session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                 at TEXT NOT NULL,
                 role TEXT NOT NULL,
                 text TEXT NOT NULL,
                 meta TEXT NOT NULL
             );

             CREATE INDEX IF NOT EXISTS idx_transcript_session
                 ON transcript(session_id, seq);",
        )
        .map_err(unavailable)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock_connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn role_to_str(role: EntryRole) -> &'static str {
        match role {
            EntryRole::User => "user",
            EntryRole::Assistant => "assistant",
        }
    }

    fn str_to_role(value: &str) -> Result<EntryRole, StoreError> {
        match value {
            "user" => Ok(EntryRole::User),
            "assistant" => Ok(EntryRole::Assistant),
            other => Err(StoreError::Serialization(format!(
                "unknown transcript role: {other}"
            ))),
        }
    }

    fn map_session_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawSession> {
        Ok(RawSession {
            id: row.get(0)?,
            created_at: row.get(1)?,
            caller_id: row.get(2)?,
            context: row.get(3)?,
            pending: row.get(4)?,
        })
    }
}

struct RawSession {
    id: String,
    created_at: String,
    caller_id: Option<String>,
    context: String,
    pending: Option<String>,
}

impl RawSession {
    fn into_session(self) -> Result<Session, StoreError> {
        Ok(Session {
            id: self.id,
            created_at: parse_timestamp(&self.created_at)?,
            caller_id: self.caller_id,
            context: from_json(&self.context)?,
            pending: self.pending.as_deref().map(from_json).transpose()?,
        })
    }
}

impl SessionStore for SqliteSessionStore {
    fn get_or_create(
        &self,
        session_id: &str,
        caller_id: Option<&str>,
    ) -> Result<Session, StoreError> {
        if let Some(existing) = self.get(session_id)? {
            return Ok(existing);
        }

        {
            let conn = self.lock_connection();
            conn.execute(
                "INSERT OR IGNORE INTO sessions (id, created_at, caller_id, context, pending)
                 VALUES (?1, ?2, ?3, ?4, NULL)",
                params![
                    session_id,
                    Utc::now().to_rfc3339(),
                    caller_id,
                    to_json(&SessionContext::default())?,
                ],
            )
            .map_err(unavailable)?;
        }

        // Re-select: a concurrent creator (another connection on the same
        // database) may have won the insert, and its row is authoritative.
        self.get(session_id)?.ok_or_else(|| {
            StoreError::Unavailable(format!("session {session_id} missing after insert"))
        })
    }

    fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        let conn = self.lock_connection();
        let raw = conn
            .query_row(
                "SELECT id, created_at, caller_id, context, pending
                 FROM sessions
                 WHERE id = ?1",
                params![session_id],
                Self::map_session_row,
            )
            .optional()
            .map_err(unavailable)?;
        raw.map(RawSession::into_session).transpose()
    }

    fn record_turn(
        &self,
        session_id: &str,
        context: &SessionContext,
        entry: &TranscriptEntry,
    ) -> Result<(), StoreError> {
        let context_json = to_json(context)?;
        let meta_json = to_json(&entry.meta)?;

        let mut conn = self.lock_connection();
        // Both writes commit together; dropping the transaction on any
        // early return rolls the context update back.
        let tx = conn.transaction().map_err(unavailable)?;
        let updated = tx
            .execute(
                "UPDATE sessions SET context = ?1 WHERE id = ?2",
                params![context_json, session_id],
            )
            .map_err(unavailable)?;
        if updated == 0 {
            return Err(StoreError::Unavailable(format!(
                "session {session_id} not found"
            )));
        }
        tx.execute(
            "INSERT INTO transcript (session_id, at, role, text, meta)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                entry.at.to_rfc3339(),
                Self::role_to_str(entry.role),
                entry.text,
                meta_json,
            ],
        )
        .map_err(unavailable)?;
        tx.commit().map_err(unavailable)?;
        Ok(())
    }

    fn append_transcript(
        &self,
        session_id: &str,
        entry: &TranscriptEntry,
    ) -> Result<(), StoreError> {
        let conn = self.lock_connection();
        conn.execute(
            "INSERT INTO transcript (session_id, at, role, text, meta)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session_id,
                entry.at.to_rfc3339(),
                Self::role_to_str(entry.role),
                entry.text,
                to_json(&entry.meta)?,
            ],
        )
        .map_err(unavailable)?;
        Ok(())
    }

    fn transcript(&self, session_id: &str) -> Result<Vec<TranscriptEntry>, StoreError> {
        let conn = self.lock_connection();
        let mut stmt = conn
            .prepare(
                "SELECT at, role, text, meta
                 FROM transcript
                 WHERE session_id = ?1
                 ORDER BY seq ASC",
            )
            .map_err(unavailable)?;

        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(unavailable)?;

        let mut entries = Vec::new();
        for row in rows {
            let (at, role, text, meta) = row.map_err(unavailable)?;
            entries.push(TranscriptEntry {
                at: parse_timestamp(&at)?,
                role: Self::str_to_role(&role)?,
                text,
                meta: from_json::<EntryMeta>(&meta)?,
            });
        }
        Ok(entries)
    }

    fn pending_decision(
        &self,
        session_id: &str,
    ) -> Result<Option<PendingDecision>, StoreError> {
        let conn = self.lock_connection();
        let raw: Option<Option<String>> = conn
            .query_row(
                "SELECT pending FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(unavailable)?;
        raw.flatten().as_deref().map(from_json).transpose()
    }

    fn set_pending_decision(
        &self,
        session_id: &str,
        decision: &PendingDecision,
    ) -> Result<(), StoreError> {
        let conn = self.lock_connection();
        let updated = conn
            .execute(
                "UPDATE sessions SET pending = ?1 WHERE id = ?2",
                params![to_json(decision)?, session_id],
            )
            .map_err(unavailable)?;
        if updated == 0 {
            return Err(StoreError::Unavailable(format!(
                "session {session_id} not found"
            )));
        }
        Ok(())
    }

    fn clear_pending_decision(&self, session_id: &str) -> Result<(), StoreError> {
        let conn = self.lock_connection();
        conn.execute(
            "UPDATE sessions SET pending = NULL WHERE id = ?1",
            params![session_id],
        )
        .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(error: rusqlite::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|error| StoreError::Serialization(error.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|error| StoreError::Serialization(error.to_string()))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| StoreError::Serialization(format!("bad timestamp {raw}: {error}")))
}
