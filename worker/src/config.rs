use std::{env, path::PathBuf};

use alloy::primitives::Address;
use config::{Config, File};
use serde::Deserialize;
use spotter_core::chain::ChainConfig;
use spotter_executors::{
    confirm::ConfirmationOptions, faucet::FaucetOptions, reputation::DEFAULT_LEADERBOARD_URL,
};

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub contracts: ContractsConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub faucet: FaucetOptions,
    #[serde(default)]
    pub confirmation: ConfirmationOptions,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub reputation: ReputationConfig,
    /// Content gateway base URLs, the built-in list when empty
    #[serde(default)]
    pub gateways: Vec<String>,
    #[serde(default)]
    pub work: WorkConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractsConfig {
    pub data_spotting: Address,
    /// Required only when `keys.master_address` is set
    #[serde(default)]
    pub address_manager: Option<Address>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct KeysConfig {
    /// Defaults to the key file under the user's home directory
    pub path: Option<PathBuf>,
    /// User address the worker claims as its master at startup
    pub master_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GasConfig {
    /// Legacy gas price in wei for worker transactions
    pub price: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self { price: 100_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    pub enabled: bool,
    pub leaderboard_url: String,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            leaderboard_url: DEFAULT_LEADERBOARD_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    pub poll_interval_secs: u64,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub host: String,
    /// Serves `/metrics` when set
    pub metrics_port: Option<u16>,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            metrics_port: None,
        }
    }
}

pub fn get_config() -> anyhow::Result<WorkerConfig> {
    let base_path = env::current_dir()?;
    let configuration_directory = base_path.join("configuration");

    // Detect the running environment
    let environment: Environment = env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(anyhow::Error::msg)?;

    let environment_filename = format!("worker_{}.yaml", environment.as_str());

    let config = Config::builder()
        .add_source(File::from(configuration_directory.join("worker_base.yaml")))
        .add_source(File::from(configuration_directory.join(environment_filename)).required(false))
        .add_source(
            config::Environment::with_prefix("app")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("chain.read_rpc_urls")
                .with_list_parse_key("gateways")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize::<WorkerConfig>().map_err(|e| {
        anyhow::anyhow!(
            "{e}. Make sure all required fields are set in the configuration files or environment variables"
        )
    })
}

/// The possible runtime environment for our application.
pub enum Environment {
    Local,
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "development" => Ok(Self::Development),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use either `local`, `development`, or `production`."
            )),
        }
    }
}
