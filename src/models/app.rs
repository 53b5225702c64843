//! InterlockApps, their permissions and data models.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::enumerations::DataFieldCast;
use crate::error::{Il2Error, Result};
use crate::marshal::{option_timestamp, Model};
use crate::range::LimitedRange;

static UNSAFE_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\s\\/:"<>|*?]+"#).expect("name pattern is valid"));

/// An app and the actions of it a key may perform.
///
/// Wire form is `#<appId>[,<actionId>...]`; an empty action list means every
/// action of the app.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppPermissions {
    pub app_id: u64,
    pub action_ids: Vec<u64>,
}

impl AppPermissions {
    pub fn new(app_id: u64, action_ids: Vec<u64>) -> Self {
        Self { app_id, action_ids }
    }

    /// Permission for every action of `app_id`.
    pub fn all_actions(app_id: u64) -> Self {
        Self::new(app_id, Vec::new())
    }

    /// `App #4 Actions 100,200` / `App #4 All Actions`
    pub fn describe(&self) -> String {
        let actions = match self.action_ids.len() {
            0 => "All Actions".to_string(),
            1 => format!("Action {}", self.action_ids[0]),
            _ => format!("Actions {}", join_ids(&self.action_ids)),
        };
        format!("App #{} {}", self.app_id, actions)
    }
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl fmt::Display for AppPermissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.action_ids.is_empty() {
            write!(f, "#{}", self.app_id)
        } else {
            write!(f, "#{},{}", self.app_id, join_ids(&self.action_ids))
        }
    }
}

impl FromStr for AppPermissions {
    type Err = Il2Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Il2Error::Format(format!("'{}' is not a valid app permission", s));
        let text = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        // "#4," is how a permission without actions is sometimes written.
        let text = text.strip_suffix(',').unwrap_or(text);
        let mut parts = text.split(',');

        let app_id = parts
            .next()
            .and_then(|p| p.trim().parse().ok())
            .ok_or_else(invalid)?;
        let action_ids = parts
            .map(|p| p.trim().parse().map_err(|_| invalid()))
            .collect::<Result<Vec<u64>>>()?;
        Ok(Self { app_id, action_ids })
    }
}

impl Serialize for AppPermissions {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AppPermissions {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Apps valid on a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppsModel {
    pub network: Option<String>,
    #[serde(default)]
    pub valid_apps: Vec<PublishedApp>,
}

impl Model for AppsModel {}

/// InterlockApp published on a network.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedApp {
    pub alternative_id: Option<u64>,
    /// Four part numeric version, e.g. `1.2.0.3`.
    pub app_version: String,
    pub description: Option<String>,
    pub id: u64,
    pub name: String,
    pub publisher_id: Option<String>,
    pub publisher_name: String,
    #[serde(default)]
    pub data_models: Vec<DataModel>,
    #[serde(default, rename = "reservedILTagIds")]
    pub reserved_il_tag_ids: Vec<LimitedRange>,
    pub simplified_hash_code: Option<i64>,
    #[serde(default, with = "option_timestamp")]
    pub start: Option<DateTime<FixedOffset>>,
    pub version: Option<u32>,
}

impl Model for PublishedApp {}

impl PublishedApp {
    /// `<publisher>.<name>#<version>` with path-hostile characters replaced by `_`.
    pub fn composite_name(&self) -> String {
        let name = format!("{}.{}#{}", self.publisher_name, self.name, self.app_version);
        UNSAFE_NAME_CHARS.replace_all(&name, "_").into_owned()
    }

    fn version_parts(&self) -> Vec<u64> {
        let mut parts: Vec<u64> = self
            .app_version
            .split('.')
            .map(|p| p.trim().parse().unwrap_or(0))
            .collect();
        while parts.last() == Some(&0) {
            parts.pop();
        }
        parts
    }
}

impl PartialEq for PublishedApp {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.version_parts() == other.version_parts()
    }
}

impl Eq for PublishedApp {}

impl PartialOrd for PublishedApp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublishedApp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id
            .cmp(&other.id)
            .then_with(|| self.version_parts().cmp(&other.version_parts()))
    }
}

impl fmt::Display for PublishedApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  #{} {}", self.id, self.composite_name())?;
        if let Some(description) = &self.description {
            write!(f, "\n    {}", description)?;
        }
        Ok(())
    }
}

/// Payload layout of the records an app stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModel {
    pub description: Option<String>,
    #[serde(default)]
    pub data_fields: Vec<DataFieldModel>,
    #[serde(default)]
    pub indexes: Vec<DataIndexModel>,
    pub payload_name: String,
    pub payload_tag_id: u64,
    pub version: Option<u32>,
}

impl Model for DataModel {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFieldModel {
    pub cast: Option<DataFieldCast>,
    pub element_tag_id: Option<u64>,
    pub is_opaque: Option<bool>,
    pub is_optional: Option<bool>,
    pub description: Option<String>,
    #[serde(rename = "Enumeration")]
    pub enumeration: Option<Value>,
    pub enumeration_as_flags: Option<bool>,
    pub name: String,
    pub serialization_version: Option<u32>,
    pub sub_data_fields: Option<Vec<DataFieldModel>>,
    pub tag_id: u64,
    pub version: Option<u32>,
}

impl Model for DataFieldModel {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIndexModel {
    #[serde(default)]
    pub elements: Vec<DataIndexElementModel>,
    #[serde(default)]
    pub is_unique: bool,
    pub name: String,
}

impl Model for DataIndexModel {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIndexElementModel {
    #[serde(default)]
    pub descending_order: bool,
    pub field_path: String,
    pub function: Option<String>,
}

impl Model for DataIndexElementModel {}
