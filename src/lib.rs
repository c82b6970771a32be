#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::new_without_default,
    clippy::return_self_not_must_use
)]

pub mod approval;
pub mod config;
pub mod cooldown;
pub mod executor;
pub mod gateway;
pub mod governance;
pub mod intent;
pub mod router;
pub mod sessions;

pub use config::Config;
use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `opsgate`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; binary-level glue continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum OpsError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Routing / validation ────────────────────────────────────────────
    #[error("route: {0}")]
    Route(#[from] RouteError),

    // ── Governance policy ───────────────────────────────────────────────
    #[error("policy: {0}")]
    Policy(#[from] PolicyError),

    // ── Session store ───────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Approval / decision endpoint ────────────────────────────────────
    #[error("approval: {0}")]
    Approval(#[from] ApprovalError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Routing errors ──────────────────────────────────────────────────────────

/// Rejected before any state mutation.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("validation failed: {0}")]
    Validation(String),
}

// ─── Governance policy errors ────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy read failed: {0}")]
    Read(String),

    #[error("policy parse failed: {0}")]
    Parse(String),
}

// ─── Session store errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    /// Transient backend failure. Callers retry once locally, then surface.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("serialization: {0}")]
    Serialization(String),
}

// ─── Approval errors (decision endpoint path only) ──────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApprovalError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("no pending decision for this session")]
    PendingNotFound,

    #[error("nonce does not match the pending decision")]
    NonceMismatch,

    #[error("pending decision has expired")]
    Expired,

    #[error("store: {0}")]
    Store(String),
}

impl From<StoreError> for ApprovalError {
    fn from(error: StoreError) -> Self {
        Self::Store(error.to_string())
    }
}
