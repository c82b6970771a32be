use anyhow::Result;
use clap::Parser;
use opsgate::config::Config;
use opsgate::executor::LogOnlyExecutor;
use opsgate::gateway::{AppState, run_gateway};
use opsgate::governance::{
    FilePolicyProvider, GovernanceGate, PolicyProvider, StaticPolicyProvider,
};
use opsgate::router::{CommandRouter, RouterConfig};
use opsgate::sessions::{InMemorySessionStore, SessionStore, SqliteSessionStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// opsgate — risk-gated operational command router.
#[derive(Parser)]
#[command(name = "opsgate", version, about)]
struct Cli {
    /// Config file path (defaults to ~/.opsgate/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the bind host from config.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port from config.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_or_init_at(path)?,
        None => Config::load_or_init()?,
    };

    let store: Arc<dyn SessionStore> = match &config.store.db_path {
        Some(db_path) => {
            tracing::info!(path = %db_path.display(), "using sqlite session store");
            Arc::new(SqliteSessionStore::new(db_path)?)
        }
        None => {
            tracing::info!("using in-memory session store");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let provider: Arc<dyn PolicyProvider> = match &config.governance.policy_path {
        Some(policy_path) => Arc::new(FilePolicyProvider::new(
            policy_path.clone(),
            chrono::Duration::seconds(config.governance.policy_cache_secs),
        )),
        None => Arc::new(StaticPolicyProvider::allow_all()),
    };
    let gate = GovernanceGate::new(provider, config.governance.posture);

    let router_config = RouterConfig {
        cooldown_window: chrono::Duration::minutes(config.router.cooldown_minutes),
        approval_expiry: chrono::Duration::minutes(config.router.approval_expiry_minutes),
    };
    let router = Arc::new(CommandRouter::new(gate, store, router_config));

    let state = AppState {
        router,
        executor: Arc::new(LogOnlyExecutor),
    };

    let host = cli.host.unwrap_or_else(|| config.gateway.host.clone());
    let port = cli.port.unwrap_or(config.gateway.port);
    run_gateway(&host, port, state).await
}
