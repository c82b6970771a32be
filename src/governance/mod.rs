//! Governance gate: an externally-administered block-list consulted before
//! any other routing logic.
//!
//! The policy is read-only from the router's perspective. The gate's
//! behavior when the policy cannot be read is an explicit, configured
//! posture: `fail_closed` (default — an unreadable policy blocks) or
//! `fail_open` for deployments that prefer availability.

use crate::PolicyError;
use crate::intent::Intent;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Wildcard entry in `disabled` that blocks every intent.
pub const BLOCK_ALL: &str = "*";

/// Administrator-writable block-list record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovernancePolicy {
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl GovernancePolicy {
    /// Wildcard first, then the specific intent name.
    pub fn blocks(&self, intent: Intent) -> bool {
        self.disabled.iter().any(|entry| entry == BLOCK_ALL)
            || self.disabled.iter().any(|entry| entry == intent.as_ref())
    }
}

/// Source of the current governance policy. Consulted on every request;
/// implementations may cache with bounded staleness.
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    async fn current(&self) -> Result<GovernancePolicy, PolicyError>;
}

/// In-process policy, swapped atomically by an admin surface or tests.
pub struct StaticPolicyProvider {
    policy: ArcSwap<GovernancePolicy>,
}

impl StaticPolicyProvider {
    pub fn new(policy: GovernancePolicy) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn allow_all() -> Self {
        Self::new(GovernancePolicy::default())
    }

    pub fn set(&self, policy: GovernancePolicy) {
        self.policy.store(Arc::new(policy));
    }
}

#[async_trait]
impl PolicyProvider for StaticPolicyProvider {
    async fn current(&self) -> Result<GovernancePolicy, PolicyError> {
        Ok(self.policy.load().as_ref().clone())
    }
}

/// TOML file policy with a bounded-staleness cache.
///
/// A cached copy is served within `ttl` of the last successful read; past
/// the TTL the file is re-read and a read failure surfaces to the gate
/// (which applies its posture) rather than silently serving stale state.
pub struct FilePolicyProvider {
    path: PathBuf,
    ttl: Duration,
    cached: Mutex<Option<(Instant, GovernancePolicy)>>,
}

impl FilePolicyProvider {
    pub fn new(path: PathBuf, ttl: Duration) -> Self {
        Self {
            path,
            ttl,
            cached: Mutex::new(None),
        }
    }

    fn cached_fresh(&self) -> Option<GovernancePolicy> {
        let cached = self
            .cached
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let (read_at, policy) = cached.as_ref()?;
        let ttl = std::time::Duration::from_secs(self.ttl.num_seconds().max(0) as u64);
        if read_at.elapsed() < ttl {
            Some(policy.clone())
        } else {
            None
        }
    }

    fn read_file(&self) -> Result<GovernancePolicy, PolicyError> {
        let raw = std::fs::read_to_string(&self.path)
            .map_err(|error| PolicyError::Read(format!("{}: {error}", self.path.display())))?;
        toml::from_str(&raw).map_err(|error| PolicyError::Parse(error.to_string()))
    }
}

#[async_trait]
impl PolicyProvider for FilePolicyProvider {
    async fn current(&self) -> Result<GovernancePolicy, PolicyError> {
        if let Some(policy) = self.cached_fresh() {
            return Ok(policy);
        }
        let policy = self.read_file()?;
        let mut cached = self
            .cached
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *cached = Some((Instant::now(), policy.clone()));
        Ok(policy)
    }
}

/// Behavior when the policy cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePosture {
    /// Unreadable policy blocks everything.
    #[default]
    FailClosed,
    /// Unreadable policy lets traffic through (degraded mode).
    FailOpen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateVerdict {
    pub blocked: bool,
    pub reason: Option<String>,
}

impl GateVerdict {
    fn allow() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    fn block(reason: impl Into<String>) -> Self {
        Self {
            blocked: true,
            reason: Some(reason.into()),
        }
    }
}

pub struct GovernanceGate {
    provider: Arc<dyn PolicyProvider>,
    posture: FailurePosture,
}

impl GovernanceGate {
    pub fn new(provider: Arc<dyn PolicyProvider>, posture: FailurePosture) -> Self {
        Self { provider, posture }
    }

    pub async fn check(&self, intent: Intent) -> GateVerdict {
        match self.provider.current().await {
            Ok(policy) if policy.blocks(intent) => {
                let reason = policy
                    .reason
                    .unwrap_or_else(|| "governance policy".to_string());
                tracing::warn!(%intent, %reason, "intent blocked by governance policy");
                GateVerdict::block(reason)
            }
            Ok(_) => GateVerdict::allow(),
            Err(error) => {
                tracing::error!(%intent, %error, posture = ?self.posture, "governance policy read failed");
                match self.posture {
                    FailurePosture::FailOpen => GateVerdict::allow(),
                    FailurePosture::FailClosed => {
                        GateVerdict::block("governance policy unavailable")
                    }
                }
            }
        }
    }
}
