use crate::intent::{Intent, RiskTier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-conversation state, keyed by a caller-supplied opaque session id.
///
/// Mutated on every turn; never deleted by this subsystem (retention is an
/// external lifecycle concern).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub caller_id: Option<String>,
    #[serde(default)]
    pub context: SessionContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingDecision>,
}

/// Multi-turn conversational context.
///
/// Sticky-target semantics: once a target is supplied in any turn it is
/// retained here as the default; an explicit target in a later turn
/// overrides it and becomes the new sticky value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryRole {
    User,
    Assistant,
}

/// Append-only transcript line scoped to a session. Insertion order is the
/// only meaningful order; the cooldown guard reconstructs approval history
/// from these entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub at: DateTime<Utc>,
    pub role: EntryRole,
    pub text: String,
    #[serde(default)]
    pub meta: EntryMeta,
}

/// Structured flags attached to a transcript entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntryMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub pending: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub approved: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rejected: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cooldown: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl EntryMeta {
    pub fn for_intent(intent: Intent) -> Self {
        Self {
            intent: Some(intent),
            ..Self::default()
        }
    }
}

impl TranscriptEntry {
    pub fn now(role: EntryRole, text: impl Into<String>, meta: EntryMeta) -> Self {
        Self {
            at: Utc::now(),
            role,
            text: text.into(),
            meta,
        }
    }
}

/// Record of an issued-but-unresolved approval request. At most one per
/// session; issuing a new one overwrites any outstanding one (no queuing).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingDecision {
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub created_at: DateTime<Utc>,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
    pub risk: RiskTier,
}

impl PendingDecision {
    /// Expiry is purely time-based and lazily evaluated; there is no
    /// background sweep.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}
