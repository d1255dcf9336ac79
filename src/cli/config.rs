//! govdriver configuration file handling
//!
//! Configuration is a TOML file plus environment overrides. The environment
//! variable names are the ones the deployment scripts have always used
//! (`RPC`, `GOVERNANCE_ADDRESS`, ...), so an existing `.env` keeps working
//! when exported into the shell.
//!
//! Every value is resolved before any contract handle is built; the driver
//! only ever sees bound handles.

use alloy_primitives::Address;
use govdriver::chain::RpcSettings;
use govdriver::governance::PollPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to write config file '{path}': {reason}")]
    Write { path: PathBuf, reason: String },

    #[error("Missing required setting '{key}' (set it in the config file or via {env})")]
    Missing { key: &'static str, env: &'static str },

    #[error("Invalid value for '{key}': {value} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// govdriver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GovConfig {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub contracts: ContractsConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node endpoint and sending account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL
    pub url: Option<String>,

    /// Account transactions are sent from; the node or signing proxy holds its key
    pub sender: Option<Address>,
}

/// Deployed contract addresses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    pub governance: Option<Address>,
    pub voting_token: Option<Address>,
    pub berachef: Option<Address>,
    pub rewards_vault: Option<Address>,
    pub vault_factory: Option<Address>,
    /// Staking token a rewards vault is created for
    pub token: Option<Address>,
}

/// Poll cadence, as humantime durations ("60s", "1h", "none")
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval")]
    pub interval: String,

    #[serde(default = "default_active_timeout")]
    pub active_timeout: String,

    #[serde(default = "default_receipt_interval")]
    pub receipt_interval: String,

    #[serde(default = "default_receipt_timeout")]
    pub receipt_timeout: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_interval() -> String {
    "60s".to_string()
}

fn default_active_timeout() -> String {
    "1h".to_string()
}

fn default_receipt_interval() -> String {
    "2s".to_string()
}

fn default_receipt_timeout() -> String {
    "5m".to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            active_timeout: default_active_timeout(),
            receipt_interval: default_receipt_interval(),
            receipt_timeout: default_receipt_timeout(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Environment variables that override file settings.
pub const ENV_RPC: &str = "RPC";
pub const ENV_SENDER: &str = "SENDER_ADDRESS";
pub const ENV_GOVERNANCE: &str = "GOVERNANCE_ADDRESS";
pub const ENV_VOTING_TOKEN: &str = "BGT_ADDRESS";
pub const ENV_BERACHEF: &str = "BERACHEF_ADDRESS";
pub const ENV_REWARDS_VAULT: &str = "REWARDS_VAULT_ADDRESS";
pub const ENV_VAULT_FACTORY: &str = "FACTORY_ADDRESS";
pub const ENV_TOKEN: &str = "YOUR_TOKEN_ADDRESS";

impl GovConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load the file (explicit path, else the default path if present) and
    /// apply environment overrides.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => {
                let default = default_config_path();
                if default.exists() {
                    Self::load(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overwrite settings with values from `lookup` (an environment).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_RPC) {
            self.rpc.url = Some(url);
        }

        let addresses: [(&'static str, &'static str, &mut Option<Address>); 7] = [
            ("rpc.sender", ENV_SENDER, &mut self.rpc.sender),
            ("contracts.governance", ENV_GOVERNANCE, &mut self.contracts.governance),
            ("contracts.voting_token", ENV_VOTING_TOKEN, &mut self.contracts.voting_token),
            ("contracts.berachef", ENV_BERACHEF, &mut self.contracts.berachef),
            ("contracts.rewards_vault", ENV_REWARDS_VAULT, &mut self.contracts.rewards_vault),
            ("contracts.vault_factory", ENV_VAULT_FACTORY, &mut self.contracts.vault_factory),
            ("contracts.token", ENV_TOKEN, &mut self.contracts.token),
        ];

        for (key, env, slot) in addresses {
            if let Some(value) = lookup(env) {
                *slot = Some(parse_address(key, &value)?);
            }
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    #[cfg(test)]
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        write_file(path, &contents)
    }

    pub fn rpc_settings(&self) -> Result<RpcSettings, ConfigError> {
        let url = self.rpc.url.clone().ok_or(ConfigError::Missing {
            key: "rpc.url",
            env: ENV_RPC,
        })?;

        Ok(RpcSettings {
            url,
            sender: required(self.rpc.sender, "rpc.sender", ENV_SENDER)?,
            receipt_interval: parse_duration("polling.receipt_interval", &self.polling.receipt_interval)?,
            receipt_timeout: parse_duration("polling.receipt_timeout", &self.polling.receipt_timeout)?,
        })
    }

    pub fn poll_policy(&self) -> Result<PollPolicy, ConfigError> {
        let interval = parse_duration("polling.interval", &self.polling.interval)?;
        if interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "polling.interval",
                value: self.polling.interval.clone(),
                reason: "must be greater than zero".to_string(),
            });
        }

        let active_timeout = match self.polling.active_timeout.trim() {
            "none" | "off" => None,
            value => Some(parse_duration("polling.active_timeout", value)?),
        };

        Ok(PollPolicy {
            interval,
            active_timeout,
        })
    }

    pub fn governance(&self) -> Result<Address, ConfigError> {
        required(self.contracts.governance, "contracts.governance", ENV_GOVERNANCE)
    }

    pub fn voting_token(&self) -> Result<Address, ConfigError> {
        required(self.contracts.voting_token, "contracts.voting_token", ENV_VOTING_TOKEN)
    }

    pub fn berachef(&self) -> Result<Address, ConfigError> {
        required(self.contracts.berachef, "contracts.berachef", ENV_BERACHEF)
    }

    pub fn rewards_vault(&self) -> Result<Address, ConfigError> {
        required(self.contracts.rewards_vault, "contracts.rewards_vault", ENV_REWARDS_VAULT)
    }

    pub fn vault_factory(&self) -> Result<Address, ConfigError> {
        required(self.contracts.vault_factory, "contracts.vault_factory", ENV_VAULT_FACTORY)
    }

    pub fn token(&self) -> Result<Address, ConfigError> {
        required(self.contracts.token, "contracts.token", ENV_TOKEN)
    }

    /// Generate default configuration content as a string with comments
    pub fn generate_default_toml() -> String {
        r#"# govdriver configuration
#
# Every setting below can also be supplied through the environment variable
# named next to it; the environment wins over this file.

[rpc]
# JSON-RPC endpoint (RPC)
# url = "http://localhost:8545"

# Account transactions are sent from (SENDER_ADDRESS).
# The node, or a signing proxy in front of it, must hold this account's key.
# sender = "0x..."

[contracts]
# Governor contract (GOVERNANCE_ADDRESS)
# governance = "0x..."

# Delegable voting token, BGT (BGT_ADDRESS)
# voting_token = "0x..."

# BeraChef reward allocator (BERACHEF_ADDRESS)
# berachef = "0x..."

# Rewards vault to add to the friends of the chef (REWARDS_VAULT_ADDRESS)
# rewards_vault = "0x..."

# Rewards vault factory (FACTORY_ADDRESS)
# vault_factory = "0x..."

# Staking token for create-vault (YOUR_TOKEN_ADDRESS)
# token = "0x..."

[polling]
# Delay between proposal state reads
interval = "60s"

# How long to wait for the vote to open before giving up ("none" waits forever).
# Giving up is not an error: run propose again later.
active_timeout = "1h"

# Transaction receipt polling
receipt_interval = "2s"
receipt_timeout = "5m"

[logging]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
level = "info"
"#
        .to_string()
    }

    /// Create and save a default configuration file
    pub fn create_default(config_path: &Path) -> Result<(), ConfigError> {
        write_file(config_path, &Self::generate_default_toml())
    }
}

/// Get the default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("govdriver")
        .join("config.toml")
}

fn write_file(path: &Path, contents: &str) -> Result<(), ConfigError> {
    // Create parent directory if needed
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            reason: format!("failed to create directory: {}", e),
        })?;
    }

    fs::write(path, contents).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn required(
    value: Option<Address>,
    key: &'static str,
    env: &'static str,
) -> Result<Address, ConfigError> {
    value.ok_or(ConfigError::Missing { key, env })
}

pub fn parse_address(key: &'static str, value: &str) -> Result<Address, ConfigError> {
    Address::from_str(value.trim()).map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_duration(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
