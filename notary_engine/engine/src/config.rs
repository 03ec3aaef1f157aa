//! Engine configuration: JSON file, then environment overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::fingerprint::DEFAULT_MAX_FILE_SIZE;
use crate::types::Identity;

pub const DEFAULT_REQUIRED_IDENTITY: &str = "0xB7393AD6D79663D4d56aE0988cEe1d94e72F5608";
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x76b554b49c60C673B428A4F5331727e5138C0Ba7";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest accepted file, in bytes.
    pub max_file_size: u64,
    /// Identity the verification workflow is restricted to. `None` lifts the restriction.
    pub required_identity: Option<Identity>,
    pub contract_address: String,
    /// Directory and file stem of the storage path recorded on the ledger.
    pub storage_directory: String,
    pub storage_stem: String,
    pub telemetry_enabled: bool,
    pub telemetry_buffer: usize,
    pub log_dir: String,
    pub log_json: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            required_identity: Identity::parse(DEFAULT_REQUIRED_IDENTITY).ok(),
            contract_address: DEFAULT_CONTRACT_ADDRESS.to_string(),
            storage_directory: "ArchivosCertificados".to_string(),
            storage_stem: "archivo".to_string(),
            telemetry_enabled: true,
            telemetry_buffer: 64,
            log_dir: "logs".to_string(),
            log_json: false,
        }
    }
}

impl EngineConfig {
    /// Load a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        debug!(path = %path.as_ref().display(), "loaded config file");
        Ok(config)
    }

    /// Apply `NOTARY_*` overrides from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("NOTARY_MAX_FILE_SIZE") {
            self.max_file_size = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "NOTARY_MAX_FILE_SIZE",
                value,
            })?;
        }

        if let Some(value) = lookup("NOTARY_REQUIRED_IDENTITY") {
            // Empty value lifts the restriction
            self.required_identity = if value.trim().is_empty() {
                None
            } else {
                Some(Identity::parse(&value).map_err(|_| ConfigError::InvalidValue {
                    key: "NOTARY_REQUIRED_IDENTITY",
                    value,
                })?)
            };
        }

        if let Some(value) = lookup("NOTARY_CONTRACT_ADDRESS") {
            self.contract_address = value;
        }

        if let Some(value) = lookup("NOTARY_STORAGE_DIRECTORY") {
            self.storage_directory = value;
        }

        if let Some(value) = lookup("NOTARY_TELEMETRY") {
            self.telemetry_enabled = parse_flag("NOTARY_TELEMETRY", value)?;
        }

        if let Some(value) = lookup("NOTARY_LOG_DIR") {
            self.log_dir = value;
        }

        if let Some(value) = lookup("NOTARY_LOG_JSON") {
            self.log_json = parse_flag("NOTARY_LOG_JSON", value)?;
        }

        Ok(self)
    }
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}
