//! Executor handoff seam.
//!
//! The router's only obligation to the systems that actually perform an
//! approved action is to hand off the intent name and bound target, strictly
//! after a successful approve resolution. Real deployments inject their
//! retuning/deploy pipeline client here.

use crate::intent::Intent;
use async_trait::async_trait;

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, intent: Intent, target: Option<&str>) -> anyhow::Result<()>;
}

/// Default executor: records the handoff and does nothing else.
pub struct LogOnlyExecutor;

#[async_trait]
impl ActionExecutor for LogOnlyExecutor {
    async fn execute(&self, intent: Intent, target: Option<&str>) -> anyhow::Result<()> {
        tracing::info!(%intent, target = target.unwrap_or("all teams"), "executor handoff");
        Ok(())
    }
}
