//! Runtime configuration read from a TOML file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::{
    AccountData, AccountStatus, AccountType, AssetData, AssetType, CurrencyData, CurrencyType,
};

/// User preferences the view-model falls back on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preference {
    /// Joins category names into a path when the database sets no delimiter.
    pub category_delimiter: String,
    pub currency_type: CurrencyType,
    pub account_type: AccountType,
    pub account_status: AccountStatus,
    pub asset_type: AssetType,
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            category_delimiter: ":".to_string(),
            currency_type: CurrencyType::default(),
            account_type: AccountType::default(),
            account_status: AccountStatus::default(),
            asset_type: AssetType::default(),
        }
    }
}

impl Preference {
    pub fn new_currency(&self) -> CurrencyData {
        CurrencyData {
            kind: self.currency_type,
            scale: 100,
            base_conv_rate: 1.0,
            ..CurrencyData::default()
        }
    }

    pub fn new_account(&self) -> AccountData {
        AccountData {
            kind: self.account_type,
            status: self.account_status,
            ..AccountData::default()
        }
    }

    pub fn new_asset(&self) -> AssetData {
        AssetData {
            kind: self.asset_type,
            ..AssetData::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Snapshot file of the store.
    pub store: PathBuf,
    pub preference: Preference,
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: PathBuf::from("ledger.json"),
            preference: Preference::default(),
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(PathBuf),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(path) => write!(f, "{} file not found", path.display()),
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_toml(data: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(data).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if cfg.preference.category_delimiter.is_empty() {
            return Err(ConfigError::Invalid(
                "preference.category_delimiter is empty".to_string(),
            ));
        }
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|_| ConfigError::Missing(path.to_path_buf()))?;
        Self::from_toml(&data)
    }
}
