//! TOML configuration with serde defaults.
//!
//! `load_or_init` reads `~/.opsgate/config.toml`, writing the defaults on
//! first run so operators have a file to edit.

use crate::ConfigError;
use crate::governance::FailurePosture;
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub router: RouterSettings,
    pub governance: GovernanceSettings,
    pub store: StoreSettings,
    #[serde(skip)]
    pub config_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSettings {
    /// Minimum minutes between approved executions of the same intent in a
    /// session.
    pub cooldown_minutes: i64,
    /// Minutes an issued confirmation stays valid.
    pub approval_expiry_minutes: i64,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            cooldown_minutes: 5,
            approval_expiry_minutes: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceSettings {
    /// Behavior when the policy store cannot be read.
    pub posture: FailurePosture,
    /// Optional TOML policy file; absent means an in-process allow-all
    /// policy until an admin surface swaps it.
    pub policy_path: Option<PathBuf>,
    /// Bounded staleness for the file-backed policy cache.
    pub policy_cache_secs: i64,
}

impl Default for GovernanceSettings {
    fn default() -> Self {
        Self {
            posture: FailurePosture::FailClosed,
            policy_path: None,
            policy_cache_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite database path; absent means the in-memory store.
    pub db_path: Option<PathBuf>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self { db_path: None }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self, ConfigError> {
        let home = UserDirs::new()
            .map(|dirs| dirs.home_dir().to_path_buf())
            .ok_or_else(|| ConfigError::Load("could not find home directory".into()))?;
        let opsgate_dir = home.join(".opsgate");
        if !opsgate_dir.exists() {
            fs::create_dir_all(&opsgate_dir)?;
        }
        Self::load_or_init_at(&opsgate_dir.join("config.toml"))
    }

    pub fn load_or_init_at(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let contents = fs::read_to_string(config_path)?;
            let mut config: Config = toml::from_str(&contents)
                .map_err(|error| ConfigError::Load(error.to_string()))?;
            config.config_path = config_path.to_path_buf();
            config.validate()?;
            Ok(config)
        } else {
            let config = Self {
                config_path: config_path.to_path_buf(),
                ..Self::default()
            };
            config.validate()?;
            config.save()?;
            Ok(config)
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let toml_str = toml::to_string_pretty(self)
            .map_err(|error| ConfigError::Load(error.to_string()))?;
        fs::write(&self.config_path, toml_str)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.router.cooldown_minutes < 0 {
            return Err(ConfigError::Validation(
                "router.cooldown_minutes must be non-negative".into(),
            ));
        }
        if self.router.approval_expiry_minutes <= 0 {
            return Err(ConfigError::Validation(
                "router.approval_expiry_minutes must be positive".into(),
            ));
        }
        Ok(())
    }
}
