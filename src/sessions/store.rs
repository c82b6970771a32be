use super::types::{PendingDecision, Session, SessionContext, TranscriptEntry};
use crate::StoreError;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

/// Keyed persistence for sessions and their transcripts.
///
/// The router is agnostic to the backing store: a durable database, an
/// in-memory map, or a distributed cache all satisfy this contract. Turn
/// serialization is not the store's job — the router holds a per-session
/// lock across each read-modify-write (see `SessionLocks`).
pub trait SessionStore: Send + Sync {
    /// Load the session, creating it lazily on first contact.
    fn get_or_create(&self, session_id: &str, caller_id: Option<&str>)
    -> Result<Session, StoreError>;

    fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError>;

    /// Commit one turn's context patch and user transcript entry as a unit.
    /// On failure the session must read exactly as it did before the call.
    fn record_turn(
        &self,
        session_id: &str,
        context: &SessionContext,
        entry: &TranscriptEntry,
    ) -> Result<(), StoreError>;

    fn append_transcript(&self, session_id: &str, entry: &TranscriptEntry)
    -> Result<(), StoreError>;

    /// Full transcript in insertion order.
    fn transcript(&self, session_id: &str) -> Result<Vec<TranscriptEntry>, StoreError>;

    fn pending_decision(&self, session_id: &str)
    -> Result<Option<PendingDecision>, StoreError>;

    /// Overwrites any prior pending decision (no queuing).
    fn set_pending_decision(
        &self,
        session_id: &str,
        decision: &PendingDecision,
    ) -> Result<(), StoreError>;

    fn clear_pending_decision(&self, session_id: &str) -> Result<(), StoreError>;
}

#[derive(Debug)]
struct SessionRecord {
    session: Session,
    transcript: Vec<TranscriptEntry>,
}

/// Mutex-guarded map store for tests and ephemeral deployments.
pub struct InMemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    fn lock_records(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.records
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(
        &self,
        session_id: &str,
        caller_id: Option<&str>,
    ) -> Result<Session, StoreError> {
        let mut records = self.lock_records();
        let record = records
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord {
                session: Session {
                    id: session_id.to_string(),
                    created_at: Utc::now(),
                    caller_id: caller_id.map(str::to_string),
                    context: SessionContext::default(),
                    pending: None,
                },
                transcript: Vec::new(),
            });
        Ok(record.session.clone())
    }

    fn get(&self, session_id: &str) -> Result<Option<Session>, StoreError> {
        Ok(self
            .lock_records()
            .get(session_id)
            .map(|record| record.session.clone()))
    }

    fn record_turn(
        &self,
        session_id: &str,
        context: &SessionContext,
        entry: &TranscriptEntry,
    ) -> Result<(), StoreError> {
        let mut records = self.lock_records();
        let record = records
            .get_mut(session_id)
            .ok_or_else(|| StoreError::Unavailable(format!("session {session_id} not found")))?;
        record.session.context = context.clone();
        record.transcript.push(entry.clone());
        Ok(())
    }

    fn append_transcript(
        &self,
        session_id: &str,
        entry: &TranscriptEntry,
    ) -> Result<(), StoreError> {
        let mut records = self.lock_records();
        let record = records
            .get_mut(session_id)
            .ok_or_else(|| StoreError::Unavailable(format!("session {session_id} not found")))?;
        record.transcript.push(entry.clone());
        Ok(())
    }

    fn transcript(&self, session_id: &str) -> Result<Vec<TranscriptEntry>, StoreError> {
        Ok(self
            .lock_records()
            .get(session_id)
            .map(|record| record.transcript.clone())
            .unwrap_or_default())
    }

    fn pending_decision(
        &self,
        session_id: &str,
    ) -> Result<Option<PendingDecision>, StoreError> {
        Ok(self
            .lock_records()
            .get(session_id)
            .and_then(|record| record.session.pending.clone()))
    }

    fn set_pending_decision(
        &self,
        session_id: &str,
        decision: &PendingDecision,
    ) -> Result<(), StoreError> {
        let mut records = self.lock_records();
        let record = records
            .get_mut(session_id)
            .ok_or_else(|| StoreError::Unavailable(format!("session {session_id} not found")))?;
        record.session.pending = Some(decision.clone());
        Ok(())
    }

    fn clear_pending_decision(&self, session_id: &str) -> Result<(), StoreError> {
        let mut records = self.lock_records();
        if let Some(record) = records.get_mut(session_id) {
            record.session.pending = None;
        }
        Ok(())
    }
}
