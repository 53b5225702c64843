use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::enumerations::NetworkPredefinedPorts;

/// Client settings read from `il2-rest.toml`.
///
/// ```toml
/// default_chain = "UPmK1Ywqos6d1U1pMjhDX1k9cY4pWbySvZ6EqMXfLQ4"
///
/// [certificate]
/// path = "rest.api.pfx"
/// password = "password"
///
/// [host]
/// address = "node.il2"
/// port = 32032
/// verify_ca = false
/// ```
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    pub certificate: CertificateConfig,
    pub host: HostConfig,
    /// Chain used when a command names none.
    pub default_chain: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CertificateConfig {
    pub path: PathBuf,
    pub password: SecretString,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HostConfig {
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_verify_ca")]
    pub verify_ca: bool,
}

fn default_port() -> u16 {
    NetworkPredefinedPorts::MainNet.port()
}

fn default_verify_ca() -> bool {
    true
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let config_str =
            fs::read_to_string(path).context(format!("Failed to read config file: {}", path))?;

        let config: ClientConfig =
            toml::from_str(&config_str).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration with default path (il2-rest.toml)
    pub fn load() -> Result<Self> {
        Self::from_file("il2-rest.toml")
    }
}
