//! Chain identification, creation and interlocking.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::enumerations::{Algorithms, HashAlgorithms, KeyStrength};
use crate::marshal::{base64_bytes, expose_secret, Model};
use crate::models::key::CertificatePermitModel;

/// Chain id and name.
///
/// Two values are the same chain when their ids match; name and status are
/// informational.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainIdModel {
    pub id: String,
    pub name: Option<String>,
    pub licensing_status: Option<String>,
}

impl Model for ChainIdModel {}

impl PartialEq for ChainIdModel {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ChainIdModel {}

impl Hash for ChainIdModel {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for ChainIdModel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChainIdModel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for ChainIdModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chain '{}' #{} ({})",
            self.name.as_deref().unwrap_or_default(),
            self.id,
            self.licensing_status.as_deref().unwrap_or_default()
        )
    }
}

/// Emergency key file handed back when a chain is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedKeyFile {
    #[serde(with = "base64_bytes")]
    pub key_file_bytes: Vec<u8>,
    pub key_file_name: String,
    pub key_name: String,
}

impl Model for ExportedKeyFile {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainCreatedModel {
    pub id: String,
    pub name: Option<String>,
    pub licensing_status: Option<String>,
    #[serde(default)]
    pub key_files: Vec<ExportedKeyFile>,
}

impl Model for ChainCreatedModel {}

impl ChainCreatedModel {
    pub fn chain_id(&self) -> ChainIdModel {
        ChainIdModel {
            id: self.id.clone(),
            name: self.name.clone(),
            licensing_status: self.licensing_status.clone(),
        }
    }
}

impl fmt::Display for ChainCreatedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.chain_id(), f)
    }
}

fn default_emergency_strength() -> KeyStrength {
    KeyStrength::ExtraStrong
}

fn default_management_strength() -> KeyStrength {
    KeyStrength::Strong
}

fn default_operating_strength() -> KeyStrength {
    KeyStrength::Normal
}

fn default_keys_algorithm() -> Algorithms {
    Algorithms::Rsa
}

/// Parameters of a new chain.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainCreationModel {
    /// Numeric ids of the apps to enable besides the defaults.
    pub additional_apps: Option<Vec<u64>>,
    /// Client certificates to permit on the new chain.
    pub api_certificates: Option<Vec<CertificatePermitModel>>,
    pub description: Option<String>,
    #[serde(serialize_with = "expose_secret")]
    pub emergency_closing_key_password: SecretString,
    #[serde(default = "default_emergency_strength")]
    pub emergency_closing_key_strength: KeyStrength,
    #[serde(serialize_with = "expose_secret")]
    pub management_key_password: SecretString,
    #[serde(default = "default_management_strength")]
    pub management_key_strength: KeyStrength,
    #[serde(default = "default_keys_algorithm")]
    pub keys_algorithm: Algorithms,
    pub name: String,
    #[serde(default = "default_operating_strength")]
    pub operating_key_strength: KeyStrength,
    /// Parent record id.
    pub parent: Option<String>,
}

impl Model for ChainCreationModel {}

impl ChainCreationModel {
    pub fn new(
        name: &str,
        emergency_closing_key_password: &str,
        management_key_password: &str,
    ) -> Self {
        Self {
            additional_apps: None,
            api_certificates: None,
            description: None,
            emergency_closing_key_password: SecretString::new(
                emergency_closing_key_password.to_string(),
            ),
            emergency_closing_key_strength: default_emergency_strength(),
            management_key_password: SecretString::new(management_key_password.to_string()),
            management_key_strength: default_management_strength(),
            keys_algorithm: default_keys_algorithm(),
            name: name.to_string(),
            operating_key_strength: default_operating_strength(),
            parent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainSummaryModel {
    pub id: String,
    pub name: Option<String>,
    pub licensing_status: Option<String>,
    #[serde(default)]
    pub active_apps: Vec<u64>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_closed_for_new_transactions: bool,
    /// Serial number of the last record.
    pub last_record: Option<u64>,
}

impl Model for ChainSummaryModel {}

/// Request to interlock a target chain from the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForceInterlockModel {
    #[serde(default = "default_hash_algorithm")]
    pub hash_algorithm: HashAlgorithms,
    /// Minimum serial of the target's last record whose hash will be pulled.
    #[serde(default)]
    pub min_serial: u64,
    pub target_chain: String,
}

fn default_hash_algorithm() -> HashAlgorithms {
    HashAlgorithms::Sha256
}

impl Model for ForceInterlockModel {}

impl ForceInterlockModel {
    pub fn new(target_chain: &str) -> Self {
        Self {
            hash_algorithm: default_hash_algorithm(),
            min_serial: 0,
            target_chain: target_chain.to_string(),
        }
    }
}

impl fmt::Display for ForceInterlockModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "force interlock on {} @{}+ using {}",
            self.target_chain, self.min_serial, self.hash_algorithm
        )
    }
}
