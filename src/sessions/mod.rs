//! Session state: per-conversation context, append-only transcript, and the
//! single pending approval decision, behind a store-agnostic trait.

mod locks;
mod sqlite;
mod store;
mod types;

pub use locks::SessionLocks;
pub use sqlite::SqliteSessionStore;
pub use store::{InMemorySessionStore, SessionStore};
pub use types::{
    EntryMeta, EntryRole, PendingDecision, Session, SessionContext, TranscriptEntry,
};
