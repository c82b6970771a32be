//! Command router: the orchestrator composing governance gate, session
//! store, intent catalog, cooldown guard, and approval broker.
//!
//! Order per turn: validate → classify → governance check → session
//! load/update + user transcript entry → risk branch (cooldown, approval)
//! or immediate responder. All session mutations for a turn happen under
//! that session's lock, so no partial turn is observable.

pub mod responder;

use crate::approval::{ApprovalBroker, DecisionOutcome, Resolution};
use crate::cooldown::CooldownGuard;
use crate::governance::GovernanceGate;
use crate::intent::{Intent, IntentCatalog, RiskTier};
use crate::sessions::{EntryMeta, EntryRole, SessionLocks, SessionStore, TranscriptEntry};
use crate::{OpsError, RouteError, StoreError};
use chrono::{Duration, Utc};
use std::sync::Arc;

/// Fixed windows for the approval and cooldown state machines.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    pub cooldown_window: Duration,
    pub approval_expiry: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            cooldown_window: Duration::minutes(5),
            approval_expiry: Duration::minutes(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub session_id: String,
    pub text: String,
    pub target: Option<String>,
    pub caller_id: Option<String>,
}

/// Terminal routing outcome of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteResult {
    Blocked {
        message: String,
        reason: String,
    },
    Throttled {
        message: String,
        retry_after_minutes: i64,
    },
    ConfirmationRequired {
        nonce: String,
        prompt: String,
        intent: Intent,
        risk: RiskTier,
    },
    Answered {
        message: String,
        intent: Intent,
    },
}

pub struct CommandRouter {
    catalog: IntentCatalog,
    gate: GovernanceGate,
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    cooldown: CooldownGuard,
    broker: ApprovalBroker,
}

impl CommandRouter {
    pub fn new(gate: GovernanceGate, store: Arc<dyn SessionStore>, config: RouterConfig) -> Self {
        Self {
            catalog: IntentCatalog::builtin(),
            gate,
            store,
            locks: SessionLocks::new(),
            cooldown: CooldownGuard::new(config.cooldown_window),
            broker: ApprovalBroker::new(config.approval_expiry),
        }
    }

    /// Route one operator turn.
    pub async fn route(&self, request: RouteRequest) -> Result<RouteResult, OpsError> {
        if request.session_id.trim().is_empty() {
            return Err(RouteError::Validation("sessionId required".into()).into());
        }
        if request.text.trim().is_empty() {
            return Err(RouteError::Validation("text required".into()).into());
        }

        let intent = self.catalog.classify(&request.text);
        tracing::info!(
            session_id = %request.session_id,
            %intent,
            target = request.target.as_deref().unwrap_or(""),
            "routing operator command"
        );

        let verdict = self.gate.check(intent).await;

        let _turn = self.locks.acquire(&request.session_id).await;

        if verdict.blocked {
            let reason = verdict.reason.unwrap_or_else(|| "governance policy".into());
            let message = if intent == Intent::Unknown {
                format!("All commands are currently blocked by governance policy: {reason}.")
            } else {
                format!("The \"{intent}\" command is blocked by governance policy: {reason}.")
            };
            // Audit trail only; routing state is left untouched.
            self.audit_blocked_attempt(&request, intent, &message);
            return Ok(RouteResult::Blocked { message, reason });
        }

        let session = retry_once(|| {
            self.store
                .get_or_create(&request.session_id, request.caller_id.as_deref())
        })?;

        let mut context = session.context;
        if let Some(target) = &request.target {
            context.target = Some(target.clone());
        }
        context.last_intent = Some(intent);
        context.last_input = Some(request.text.clone());
        context.updated_at = Some(Utc::now());

        // Context patch and user entry land as one store operation, so a
        // failed turn leaves the session readable exactly as it was.
        let user_entry = TranscriptEntry::now(
            EntryRole::User,
            request.text.as_str(),
            EntryMeta::for_intent(intent),
        );
        retry_once(|| {
            self.store
                .record_turn(&request.session_id, &context, &user_entry)
        })?;

        if let Some(risk) = intent.risk_tier() {
            return self.route_risky(&request.session_id, intent, risk, context.target.as_deref());
        }

        let message = responder::answer(intent, context.target.as_deref());
        retry_once(|| {
            self.store.append_transcript(
                &request.session_id,
                &TranscriptEntry::now(
                    EntryRole::Assistant,
                    message.as_str(),
                    EntryMeta::for_intent(intent),
                ),
            )
        })?;
        Ok(RouteResult::Answered { message, intent })
    }

    fn route_risky(
        &self,
        session_id: &str,
        intent: Intent,
        risk: RiskTier,
        target: Option<&str>,
    ) -> Result<RouteResult, OpsError> {
        // Cooldown fails open: a failed transcript scan allows the request.
        let verdict = match self.store.transcript(session_id) {
            Ok(transcript) => self.cooldown.check(&transcript, intent, Utc::now()),
            Err(error) => {
                tracing::warn!(session_id, %intent, %error, "cooldown scan failed; allowing");
                crate::cooldown::CooldownVerdict::allowed()
            }
        };

        if !verdict.allowed {
            let minutes = verdict.retry_after_minutes;
            let message = format!(
                "Cooldown active for \"{intent}\". Retry in {minutes} minute(s)."
            );
            retry_once(|| {
                self.store.append_transcript(
                    session_id,
                    &TranscriptEntry::now(
                        EntryRole::Assistant,
                        message.as_str(),
                        EntryMeta {
                            intent: Some(intent),
                            cooldown: true,
                            ..EntryMeta::default()
                        },
                    ),
                )
            })?;
            return Ok(RouteResult::Throttled {
                message,
                retry_after_minutes: minutes,
            });
        }

        let (decision, prompt) =
            self.broker
                .request(self.store.as_ref(), session_id, intent, target, risk)?;

        retry_once(|| {
            self.store.append_transcript(
                session_id,
                &TranscriptEntry::now(
                    EntryRole::Assistant,
                    prompt.as_str(),
                    EntryMeta {
                        intent: Some(intent),
                        pending: true,
                        nonce: Some(decision.nonce.clone()),
                        ..EntryMeta::default()
                    },
                ),
            )
        })?;

        Ok(RouteResult::ConfirmationRequired {
            nonce: decision.nonce,
            prompt,
            intent,
            risk,
        })
    }

    /// Decision endpoint core: approve or reject the session's pending
    /// decision, serialized against in-flight turns on the same session.
    pub async fn resolve(
        &self,
        session_id: &str,
        nonce: &str,
        outcome: DecisionOutcome,
    ) -> Result<Resolution, OpsError> {
        if session_id.trim().is_empty() || nonce.trim().is_empty() {
            return Err(RouteError::Validation("sessionId/nonce required".into()).into());
        }

        let _turn = self.locks.acquire(session_id).await;
        self.broker
            .resolve(self.store.as_ref(), session_id, nonce, outcome)
            .map_err(Into::into)
    }

    fn audit_blocked_attempt(&self, request: &RouteRequest, intent: Intent, message: &str) {
        let audit = self
            .store
            .get_or_create(&request.session_id, request.caller_id.as_deref())
            .and_then(|_| {
                self.store.append_transcript(
                    &request.session_id,
                    &TranscriptEntry::now(
                        EntryRole::User,
                        request.text.as_str(),
                        EntryMeta::for_intent(intent),
                    ),
                )
            })
            .and_then(|()| {
                self.store.append_transcript(
                    &request.session_id,
                    &TranscriptEntry::now(
                        EntryRole::Assistant,
                        message,
                        EntryMeta {
                            intent: Some(intent),
                            blocked: true,
                            ..EntryMeta::default()
                        },
                    ),
                )
            });
        if let Err(error) = audit {
            tracing::warn!(session_id = %request.session_id, %error, "failed to audit blocked attempt");
        }
    }
}

/// Transient store errors get one local retry before surfacing.
fn retry_once<T>(mut op: impl FnMut() -> Result<T, StoreError>) -> Result<T, StoreError> {
    match op() {
        Ok(value) => Ok(value),
        Err(first) => {
            tracing::warn!(error = %first, "session store call failed; retrying once");
            op()
        }
    }
}
