//! Approval broker: mints single-use, time-limited pending decisions for
//! risky intents and resolves them on operator confirmation.
//!
//! State machine per session: `NONE → PENDING → {APPROVED, REJECTED,
//! EXPIRED} → NONE`. No transition skips `PENDING`; `EXPIRED` is inferred
//! lazily on the resolve path, never by a background sweep.

use crate::ApprovalError;
use crate::intent::{Intent, RiskTier};
use crate::sessions::{EntryMeta, EntryRole, PendingDecision, SessionStore, TranscriptEntry};
use chrono::{Duration, Utc};
use std::str::FromStr;

/// Operator verdict on a pending decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Approve,
    Reject,
}

impl FromStr for DecisionOutcome {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            other => Err(format!("decision must be 'approve' or 'reject', got '{other}'")),
        }
    }
}

/// Outcome of a successful `resolve`. `Approved` is the signal that the
/// external executor collaborator should now perform the bound action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Approved {
        intent: Intent,
        target: Option<String>,
        message: String,
    },
    Rejected {
        message: String,
    },
}

pub struct ApprovalBroker {
    expiry: Duration,
}

impl ApprovalBroker {
    pub fn new(expiry: Duration) -> Self {
        Self { expiry }
    }

    /// Mint a pending decision, overwriting any outstanding one, and return
    /// it with the operator-facing confirmation prompt.
    pub fn request(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        intent: Intent,
        target: Option<&str>,
        risk: RiskTier,
    ) -> Result<(PendingDecision, String), ApprovalError> {
        let now = Utc::now();
        let decision = PendingDecision {
            intent,
            target: target.map(str::to_string),
            created_at: now,
            nonce: new_nonce(),
            expires_at: now + self.expiry,
            risk,
        };
        store.set_pending_decision(session_id, &decision)?;

        let target_name = target.unwrap_or("all teams");
        let minutes = self.expiry.num_minutes();
        let prompt = format!(
            "Proceed with {intent} for \"{target_name}\"? Confirmation is required within {minutes} minutes."
        );
        Ok((decision, prompt))
    }

    /// Resolve the session's pending decision against a supplied nonce.
    ///
    /// Check order: pending present → nonce (constant-time) → expiry. A
    /// stale decision found on the expiry check is cleared as a side effect.
    pub fn resolve(
        &self,
        store: &dyn SessionStore,
        session_id: &str,
        nonce: &str,
        outcome: DecisionOutcome,
    ) -> Result<Resolution, ApprovalError> {
        let session = store
            .get(session_id)?
            .ok_or_else(|| ApprovalError::SessionNotFound(session_id.to_string()))?;
        let pending = session.pending.ok_or(ApprovalError::PendingNotFound)?;

        if !constant_time_eq(nonce, &pending.nonce) {
            return Err(ApprovalError::NonceMismatch);
        }

        if pending.is_expired(Utc::now()) {
            store.clear_pending_decision(session_id)?;
            return Err(ApprovalError::Expired);
        }

        store.clear_pending_decision(session_id)?;

        match outcome {
            DecisionOutcome::Approve => {
                let message = match pending.target.as_deref() {
                    Some(target) => format!("Started {} for \"{target}\".", pending.intent),
                    None => format!("Started {}.", pending.intent),
                };
                store.append_transcript(
                    session_id,
                    &TranscriptEntry::now(
                        EntryRole::Assistant,
                        message.clone(),
                        EntryMeta {
                            intent: Some(pending.intent),
                            approved: true,
                            nonce: Some(pending.nonce.clone()),
                            ..EntryMeta::default()
                        },
                    ),
                )?;
                tracing::info!(intent = %pending.intent, session_id, "pending decision approved");
                Ok(Resolution::Approved {
                    intent: pending.intent,
                    target: pending.target,
                    message,
                })
            }
            DecisionOutcome::Reject => {
                let message = format!("Cancelled {}.", pending.intent);
                store.append_transcript(
                    session_id,
                    &TranscriptEntry::now(
                        EntryRole::Assistant,
                        message.clone(),
                        EntryMeta {
                            intent: Some(pending.intent),
                            rejected: true,
                            nonce: Some(pending.nonce.clone()),
                            ..EntryMeta::default()
                        },
                    ),
                )?;
                tracing::info!(intent = %pending.intent, session_id, "pending decision rejected");
                Ok(Resolution::Rejected { message })
            }
        }
    }
}

/// 128 bits of entropy, hex-encoded.
fn new_nonce() -> String {
    use rand::RngCore;
    let mut buf = [0u8; 16];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Constant-time equality comparison for nonce strings.
fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::{ApprovalBroker, DecisionOutcome, Resolution, new_nonce};
    use crate::ApprovalError;
    use crate::intent::{Intent, RiskTier};
    use crate::sessions::{InMemorySessionStore, SessionStore};
    use chrono::{Duration, Utc};
    use std::str::FromStr;

    fn broker() -> ApprovalBroker {
        ApprovalBroker::new(Duration::minutes(10))
    }

    fn store_with_session() -> InMemorySessionStore {
        let store = InMemorySessionStore::new();
        store.get_or_create("s1", None).unwrap();
        store
    }

    #[test]
    fn nonce_is_128_bits_and_unpredictable_enough_to_differ() {
        let a = new_nonce();
        let b = new_nonce();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn request_stores_pending_and_builds_prompt() {
        let store = store_with_session();
        let (decision, prompt) = broker()
            .request(&store, "s1", Intent::Retuning, Some("team-a"), RiskTier::Medium)
            .unwrap();

        assert_eq!(decision.intent, Intent::Retuning);
        assert!(prompt.contains("retuning"));
        assert!(prompt.contains("team-a"));
        assert_eq!(
            store.pending_decision("s1").unwrap().unwrap().nonce,
            decision.nonce
        );
    }

    #[test]
    fn second_request_replaces_the_first() {
        let store = store_with_session();
        let b = broker();
        let (first, _) = b
            .request(&store, "s1", Intent::Retuning, None, RiskTier::Medium)
            .unwrap();
        let (second, _) = b
            .request(&store, "s1", Intent::DeployModel, None, RiskTier::High)
            .unwrap();

        let stored = store.pending_decision("s1").unwrap().unwrap();
        assert_eq!(stored.nonce, second.nonce);
        assert_ne!(stored.nonce, first.nonce);
        assert_eq!(stored.intent, Intent::DeployModel);
    }

    #[test]
    fn resolve_without_session_is_session_not_found() {
        let store = InMemorySessionStore::new();
        let error = broker()
            .resolve(&store, "ghost", "n", DecisionOutcome::Approve)
            .unwrap_err();
        assert!(matches!(error, ApprovalError::SessionNotFound(_)));
    }

    #[test]
    fn resolve_without_pending_is_pending_not_found() {
        let store = store_with_session();
        let error = broker()
            .resolve(&store, "s1", "n", DecisionOutcome::Approve)
            .unwrap_err();
        assert_eq!(error, ApprovalError::PendingNotFound);
    }

    #[test]
    fn resolve_with_wrong_nonce_is_nonce_mismatch_and_keeps_pending() {
        let store = store_with_session();
        broker()
            .request(&store, "s1", Intent::Retuning, None, RiskTier::Medium)
            .unwrap();

        let error = broker()
            .resolve(&store, "s1", "wrong", DecisionOutcome::Approve)
            .unwrap_err();
        assert_eq!(error, ApprovalError::NonceMismatch);
        assert!(store.pending_decision("s1").unwrap().is_some());
    }

    #[test]
    fn resolve_after_expiry_fails_and_clears_the_decision() {
        let store = store_with_session();
        let expired_broker = ApprovalBroker::new(Duration::minutes(-1));
        let (decision, _) = expired_broker
            .request(&store, "s1", Intent::Retuning, None, RiskTier::Medium)
            .unwrap();
        assert!(decision.is_expired(Utc::now()));

        let error = expired_broker
            .resolve(&store, "s1", &decision.nonce, DecisionOutcome::Approve)
            .unwrap_err();
        assert_eq!(error, ApprovalError::Expired);
        assert!(store.pending_decision("s1").unwrap().is_none());
    }

    #[test]
    fn approve_clears_pending_and_flags_transcript_approved() {
        let store = store_with_session();
        let (decision, _) = broker()
            .request(&store, "s1", Intent::Retuning, Some("team-a"), RiskTier::Medium)
            .unwrap();

        let resolution = broker()
            .resolve(&store, "s1", &decision.nonce, DecisionOutcome::Approve)
            .unwrap();

        assert!(matches!(
            resolution,
            Resolution::Approved { intent: Intent::Retuning, .. }
        ));
        assert!(store.pending_decision("s1").unwrap().is_none());

        let transcript = store.transcript("s1").unwrap();
        let last = transcript.last().unwrap();
        assert!(last.meta.approved);
        assert!(!last.meta.rejected);
        assert_eq!(last.meta.intent, Some(Intent::Retuning));
        assert_eq!(last.meta.nonce.as_deref(), Some(decision.nonce.as_str()));
    }

    #[test]
    fn reject_clears_pending_and_never_flags_approved() {
        let store = store_with_session();
        let (decision, _) = broker()
            .request(&store, "s1", Intent::DeployModel, None, RiskTier::High)
            .unwrap();

        let resolution = broker()
            .resolve(&store, "s1", &decision.nonce, DecisionOutcome::Reject)
            .unwrap();

        assert!(matches!(resolution, Resolution::Rejected { .. }));
        assert!(store.pending_decision("s1").unwrap().is_none());

        let last = store.transcript("s1").unwrap().pop().unwrap();
        assert!(last.meta.rejected);
        assert!(!last.meta.approved);
    }

    #[test]
    fn decision_outcome_parses_only_approve_or_reject() {
        assert_eq!(DecisionOutcome::from_str("approve"), Ok(DecisionOutcome::Approve));
        assert_eq!(DecisionOutcome::from_str("reject"), Ok(DecisionOutcome::Reject));
        assert!(DecisionOutcome::from_str("maybe").is_err());
    }
}
