use crate::{
    error::{AppError, AppResult},
    implementations::billing::encode_service_name,
};
use dotenvy::dotenv;
use ethers::types::Address;
use serde::Deserialize;
use std::{env, fs, path::Path};

const DEFAULT_CONFIG_PATH: &str = "Config.toml";
const DEFAULT_RPC_URL: &str = "http://ethwl2ous-dns-reg1.southeastasia.cloudapp.azure.com:8540";
const DEFAULT_CONTRACT_ADDRESS: &str = "0x1f8e57d6262d62a5e1fc14f16a44b13e5c3e6e07";
const DEFAULT_TOPUP: u64 = 50;
const DEFAULT_CONFIRMATIONS: usize = 1;

/// Strongly-typed configuration derived from a `Config.toml` or environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    #[serde(default = "default_contract_address")]
    pub contract_address: String,
    #[serde(default)]
    pub chain_id: Option<u64>,
    #[serde(default = "default_bills")]
    pub bills: Vec<String>,
    #[serde(default = "default_topup")]
    pub topup_default: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: usize,
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_contract_address() -> String {
    DEFAULT_CONTRACT_ADDRESS.to_string()
}

fn default_bills() -> Vec<String> {
    vec!["Road Tax".to_string(), "Property Tax".to_string()]
}

fn default_topup() -> u64 {
    DEFAULT_TOPUP
}

fn default_confirmations() -> usize {
    DEFAULT_CONFIRMATIONS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            contract_address: default_contract_address(),
            chain_id: None,
            bills: default_bills(),
            topup_default: DEFAULT_TOPUP,
            confirmations: DEFAULT_CONFIRMATIONS,
        }
    }
}

impl AppConfig {
    /// Load configuration, preferring a user-provided config file and falling back to env vars.
    pub fn load() -> AppResult<Self> {
        dotenv().ok();

        let configured_path =
            env::var("BILLPANEL_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let config_path = Path::new(&configured_path);

        let cfg = if config_path.exists() {
            let raw = fs::read_to_string(config_path)
                .map_err(|err| AppError::Config(format!("failed to read config file: {err}")))?;
            Self::from_toml(&raw)?
        } else {
            Self::from_env()?
        };

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml(raw: &str) -> AppResult<Self> {
        let mut cfg: AppConfig = toml::from_str(raw)
            .map_err(|err| AppError::Config(format!("failed to parse config file: {err}")))?;
        cfg.apply_chain_id_default();
        Ok(cfg)
    }

    /// Helper used when no config file is present. Every field has a default.
    fn from_env() -> AppResult<Self> {
        let mut cfg = Self::default();

        if let Ok(url) = env::var("ETH_RPC_URL") {
            cfg.rpc_url = url;
        }
        if let Ok(address) = env::var("CONTRACT_ADDRESS") {
            cfg.contract_address = address;
        }
        cfg.chain_id = parse_env("CHAIN_ID")?;
        if let Some(topup) = parse_env("TOPUP_DEFAULT")? {
            cfg.topup_default = topup;
        }
        if let Some(confirmations) = parse_env("CONFIRMATIONS")? {
            cfg.confirmations = confirmations;
        }

        cfg.apply_chain_id_default();
        Ok(cfg)
    }

    /// Reject settings the panel cannot work with before anything touches the network.
    pub fn validate(&self) -> AppResult<()> {
        self.contract_address()?;

        if self.bills.is_empty() {
            return Err(AppError::Config("at least one bill must be configured".into()));
        }
        for bill in &self.bills {
            encode_service_name(bill)
                .map_err(|err| AppError::Config(format!("bill {bill:?}: {err}")))?;
        }

        if self.topup_default == 0 {
            return Err(AppError::Config("topup_default must be at least 1".into()));
        }
        Ok(())
    }

    pub fn contract_address(&self) -> AppResult<Address> {
        self.contract_address.parse::<Address>().map_err(|err| {
            AppError::Config(format!(
                "invalid contract address {}: {err}",
                self.contract_address
            ))
        })
    }

    /// A zero chain id means "ask the provider".
    fn apply_chain_id_default(&mut self) {
        if self.chain_id == Some(0) {
            self.chain_id = None;
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> AppResult<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{key} must be numeric, got {raw:?}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_takes_defaults() {
        let cfg = AppConfig::from_toml("").unwrap();
        assert_eq!(cfg.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(cfg.bills, vec!["Road Tax", "Property Tax"]);
        assert_eq!(cfg.topup_default, 50);
        assert_eq!(cfg.confirmations, 1);
        assert!(cfg.chain_id.is_none());
        cfg.validate().unwrap();
    }

    #[test]
    fn toml_overrides_fields() {
        let cfg = AppConfig::from_toml(
            r#"
            rpc_url = "http://localhost:8545"
            chain_id = 1337
            bills = ["Water"]
            topup_default = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rpc_url, "http://localhost:8545");
        assert_eq!(cfg.chain_id, Some(1337));
        assert_eq!(cfg.bills, vec!["Water"]);
        assert_eq!(cfg.topup_default, 10);
    }

    #[test]
    fn zero_chain_id_means_unset() {
        let cfg = AppConfig::from_toml("chain_id = 0").unwrap();
        assert!(cfg.chain_id.is_none());
    }

    #[test]
    fn rejects_bad_contract_address() {
        let cfg = AppConfig {
            contract_address: "0x1234".into(),
            ..AppConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn rejects_bill_names_over_31_bytes() {
        let cfg = AppConfig {
            bills: vec!["x".repeat(32)],
            ..AppConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn accepts_bill_name_of_exactly_31_bytes() {
        let cfg = AppConfig {
            bills: vec!["x".repeat(31)],
            ..AppConfig::default()
        };
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_empty_bill_list() {
        let cfg = AppConfig {
            bills: Vec::new(),
            ..AppConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(AppError::Config(_))));
    }
}
