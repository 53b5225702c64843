//! Records stored in a chain and their creation requests.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::encryption::EncryptedTextModel;
use crate::enumerations::RecordType;
use crate::error::Result;
use crate::marshal::{base64_bytes, from_json_list, timestamp, Model};
use crate::util::build_query;

/// Opaque record with its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordModel {
    pub application_id: u64,
    pub chain_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<FixedOffset>,
    /// Hash of the full encoded bytes of the record.
    pub hash: String,
    pub payload_tag_id: u64,
    /// Zero for the first record of a chain.
    pub serial: u64,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub version: u32,
    #[serde(with = "base64_bytes")]
    pub payload_bytes: Vec<u8>,
}

impl Model for RecordModel {}

impl fmt::Display for RecordModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_pretty(self, f)
    }
}

/// Record with its payload decoded to JSON by the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordModelAsJson {
    pub application_id: u64,
    pub chain_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<FixedOffset>,
    pub hash: String,
    pub payload_tag_id: u64,
    pub serial: u64,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub version: u32,
    #[serde(default)]
    pub payload: Value,
}

impl Model for RecordModelAsJson {}

impl fmt::Display for RecordModelAsJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_pretty(self, f)
    }
}

fn write_pretty<T: Serialize>(model: &T, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let text = serde_json::to_string_pretty(model).map_err(|_| fmt::Error)?;
    f.write_str(&text)
}

/// Record produced by a forced interlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterlockingRecordModel {
    #[serde(flatten)]
    pub record: RecordModel,
    pub interlocked_chain_id: String,
    pub interlocked_record_hash: String,
    pub interlocked_record_offset: u64,
    pub interlocked_record_serial: u64,
}

impl Model for InterlockingRecordModel {}

impl fmt::Display for InterlockingRecordModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Interlocked chain {} at record #{} (offset: {}) with hash {}",
            self.interlocked_chain_id,
            self.interlocked_record_serial,
            self.interlocked_record_offset,
            self.interlocked_record_hash
        )
    }
}

/// Record holding a JSON document, usually encrypted for a set of readers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonDocumentRecordModel {
    pub application_id: u64,
    pub chain_id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<FixedOffset>,
    pub hash: String,
    pub payload_tag_id: u64,
    pub serial: u64,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub version: u32,
    pub json_text: Option<String>,
    pub network: Option<String>,
    /// Universal reference of the record.
    pub reference: Option<String>,
    pub encrypted_json: Option<EncryptedTextModel>,
}

impl Model for JsonDocumentRecordModel {}

fn default_record_type() -> RecordType {
    RecordType::Data
}

/// Raw record to append to a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecordModel {
    pub application_id: u64,
    #[serde(rename = "type", default = "default_record_type")]
    pub record_type: RecordType,
    /// Must match the bytes schema of the application.
    #[serde(with = "base64_bytes")]
    pub payload_bytes: Vec<u8>,
}

impl Model for NewRecordModel {}

impl NewRecordModel {
    pub fn new(application_id: u64, payload_bytes: Vec<u8>) -> Self {
        Self {
            application_id,
            record_type: RecordType::Data,
            payload_bytes,
        }
    }
}

/// JSON record to append to a chain.
///
/// Only `json` goes in the request body; the other fields travel in the
/// query string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecordModelAsJson {
    pub application_id: u64,
    #[serde(rename = "type", default = "default_record_type")]
    pub record_type: RecordType,
    pub json: Value,
    pub payload_tag_id: u64,
}

impl Model for NewRecordModelAsJson {}

impl NewRecordModelAsJson {
    pub fn new(application_id: u64, payload_tag_id: u64, json: Value) -> Self {
        Self {
            application_id,
            record_type: RecordType::Data,
            json,
            payload_tag_id,
        }
    }

    pub fn to_query_string(&self) -> String {
        build_query(&[
            ("applicationId", Some(self.application_id.to_string())),
            ("payloadTagId", Some(self.payload_tag_id.to_string())),
            ("type", Some(self.record_type.to_string())),
        ])
    }
}

/// One page of a paged listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: DeserializeOwned"))]
pub struct PageOf<T> {
    #[serde(default)]
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total_number_of_pages: u64,
}

impl<T: Model> Model for PageOf<T> {
    fn from_json(mut value: Value) -> Result<Self> {
        let items = value
            .as_object_mut()
            .and_then(|object| object.remove("items"))
            .unwrap_or(Value::Null);
        let page: PageOf<Value> = serde_json::from_value(value)?;
        Ok(PageOf {
            items: from_json_list(items)?,
            page: page.page,
            page_size: page.page_size,
            total_number_of_pages: page.total_number_of_pages,
        })
    }
}

impl<T> PageOf<T> {
    pub fn is_last(&self) -> bool {
        self.page + 1 >= self.total_number_of_pages
    }
}
