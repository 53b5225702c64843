//! Node and peer details.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::enumerations::NetworkProtocol;
use crate::marshal::Model;

/// Versions of the software running a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Versions {
    pub core_libs: Option<String>,
    pub main: Option<String>,
    pub peer2peer: Option<String>,
    pub tags: Option<String>,
}

impl Model for Versions {}

impl fmt::Display for Versions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CoreLibs#{} Tags#{}",
            self.core_libs.as_deref().unwrap_or_default(),
            self.tags.as_deref().unwrap_or_default()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDetailsModel {
    /// Mapping color, as a name or `#rrggbb`.
    pub color: Option<String>,
    pub id: String,
    pub name: String,
    pub network: Option<String>,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub software_versions: Versions,
    /// Ids of the chains the node owns.
    #[serde(default)]
    pub chains: Vec<String>,
}

impl Model for NodeDetailsModel {}

impl fmt::Display for NodeDetailsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_common(
            f,
            &Common {
                color: &self.color,
                id: &self.id,
                name: &self.name,
                network: &self.network,
                owner_id: &self.owner_id,
                owner_name: &self.owner_name,
                roles: &self.roles,
                versions: &self.software_versions,
            },
        )?;
        write!(f, "\nChains: {}", self.chains.join(", "))
    }
}

/// Another node this node knows about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerModel {
    pub color: Option<String>,
    pub id: String,
    pub name: String,
    pub network: Option<String>,
    pub owner_id: Option<String>,
    pub owner_name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub software_versions: Versions,
    pub address: Option<String>,
    pub port: Option<u16>,
    pub protocol: Option<NetworkProtocol>,
}

impl Model for PeerModel {}

impl fmt::Display for PeerModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_common(
            f,
            &Common {
                color: &self.color,
                id: &self.id,
                name: &self.name,
                network: &self.network,
                owner_id: &self.owner_id,
                owner_name: &self.owner_name,
                roles: &self.roles,
                versions: &self.software_versions,
            },
        )?;
        write!(
            f,
            "\nP2P listening at {}:{}",
            self.address.as_deref().unwrap_or_default(),
            self.port.map(|p| p.to_string()).unwrap_or_default()
        )
    }
}

struct Common<'a> {
    color: &'a Option<String>,
    id: &'a str,
    name: &'a str,
    network: &'a Option<String>,
    owner_id: &'a Option<String>,
    owner_name: &'a Option<String>,
    roles: &'a [String],
    versions: &'a Versions,
}

fn write_common(f: &mut fmt::Formatter<'_>, node: &Common<'_>) -> fmt::Result {
    write!(f, "Node '{}' {}", node.name, node.id)?;
    write!(
        f,
        "\nRunning il2 node#{} with Peer2Peer#{}",
        node.versions.main.as_deref().unwrap_or_default(),
        node.versions.peer2peer.as_deref().unwrap_or_default()
    )?;
    write!(f, "\nNetwork {}", node.network.as_deref().unwrap_or_default())?;
    write!(f, "\nColor {}", node.color.as_deref().unwrap_or_default())?;
    write!(
        f,
        "\nOwner {} #{}",
        node.owner_name.as_deref().unwrap_or_default(),
        node.owner_id.as_deref().unwrap_or_default()
    )?;
    write!(f, "\nRoles: {}", node.roles.join(","))?;
    write!(f, "\n{}", node.versions)
}
