//! Bridge configuration
//!
//! All knobs the bridge consumes are passed in explicitly at construction;
//! nothing reads process-wide state after startup. Values load from a TOML
//! file or from `SOLBRIDGE_*` environment variables, with defaults for
//! everything.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Ledger RPC endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Enable verbose diagnostics in binaries
    #[serde(default)]
    pub verbose: bool,

    /// Wait between liveness probes while dialing the endpoint
    #[serde(default = "default_connect_retry_secs")]
    pub connect_retry_secs: u64,

    /// Wait between attempts of a failed remote call
    #[serde(default = "default_call_retry_secs")]
    pub call_retry_secs: u64,

    /// Per-attempt confirmation poll timeout
    #[serde(default = "default_confirm_timeout_secs")]
    pub confirm_timeout_secs: u64,

    /// Payer keypair file; the wallet default path applies when unset
    #[serde(default)]
    pub keypair_path: Option<String>,
}

fn default_endpoint() -> String {
    "https://api.devnet.solana.com".to_string()
}
fn default_connect_retry_secs() -> u64 {
    10
}
fn default_call_retry_secs() -> u64 {
    11
}
fn default_confirm_timeout_secs() -> u64 {
    5
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            verbose: false,
            connect_retry_secs: default_connect_retry_secs(),
            call_retry_secs: default_call_retry_secs(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
            keypair_path: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: BridgeConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Build configuration from `SOLBRIDGE_*` environment variables,
    /// loading a `.env` file first if one is present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("SOLBRIDGE_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(debug) = std::env::var("SOLBRIDGE_DEBUG") {
            config.verbose = matches!(debug.trim(), "1" | "true" | "yes");
        }
        if let Ok(path) = std::env::var("SOLBRIDGE_KEYPAIR") {
            config.keypair_path = Some(path);
        }
        config
    }

    pub fn connect_retry(&self) -> Duration {
        Duration::from_secs(self.connect_retry_secs)
    }

    pub fn call_retry(&self) -> Duration {
        Duration::from_secs(self.call_retry_secs)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_secs(self.confirm_timeout_secs)
    }
}
