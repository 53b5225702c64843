//! Stored documents and multi-document transactions.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::enumerations::{CipherAlgorithms, DocumentsCompression};
use crate::error::{Il2Error, Result};
use crate::marshal::{base64_bytes, option_base64_bytes, timestamp, Model};
use crate::util::build_query;

pub const PLAIN_TEXT: &str = "plain/text";
const PREVIEW_LENGTH: usize = 256;

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Il2Error::Validation(format!("document must have a {}", field)));
    }
    Ok(())
}

/// Limits the node applies to uploaded documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUploadConfigurationModel {
    pub default_compression: Option<String>,
    pub default_encryption: Option<String>,
    pub file_size_limit: Option<u64>,
    /// Default number of PBE iterations to generate the key.
    pub iterations: Option<u64>,
    /// Content types as `mime-type/extension`.
    #[serde(default)]
    pub permitted_content_types: Vec<String>,
    pub time_out_in_minutes: Option<u64>,
}

impl Model for DocumentUploadConfigurationModel {}

/// Start of a transaction storing many documents in a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsBeginTransactionModel {
    pub chain: String,
    pub comment: Option<String>,
    pub compression: Option<DocumentsCompression>,
    /// `<pbe>-<hash>-<cipher>-<level>`, e.g. `PBKDF2-SHA256-AES256-LOW`.
    pub encryption: Option<String>,
    pub generate_public_directory: Option<bool>,
    pub iterations: Option<u64>,
    /// Required when `encryption` is set.
    #[serde(default, with = "option_base64_bytes")]
    pub password: Option<Vec<u8>>,
}

impl Model for DocumentsBeginTransactionModel {}

impl DocumentsBeginTransactionModel {
    pub fn new(chain: &str) -> Self {
        Self {
            chain: chain.to_string(),
            comment: None,
            compression: None,
            encryption: None,
            generate_public_directory: None,
            iterations: None,
            password: None,
        }
    }
}

/// Transaction id and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsTransactionModel {
    pub chain: String,
    pub transaction_id: String,
    /// No document is still uploading.
    #[serde(default)]
    pub can_commit_now: bool,
    #[serde(default)]
    pub count_of_uploaded_documents: u64,
    /// The transaction is aborted if not committed before this.
    #[serde(with = "timestamp")]
    pub time_out_limit: DateTime<FixedOffset>,
}

impl Model for DocumentsTransactionModel {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionParameters {
    pub iterations: Option<u64>,
    pub salt: Option<String>,
}

impl Model for EncryptionParameters {}

/// One document of a multi-document set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub name: String,
    pub comment: Option<String>,
    pub mime_type: Option<String>,
}

impl Model for DirectoryEntry {}

/// Metadata of a multi-document storage locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsMetadataModel {
    pub comment: Option<String>,
    pub compression: Option<String>,
    pub encryption: Option<String>,
    pub encryption_parameters: Option<EncryptionParameters>,
    pub public_directory: Option<Vec<DirectoryEntry>>,
}

impl Model for DocumentsMetadataModel {}

fn default_cipher() -> CipherAlgorithms {
    CipherAlgorithms::None
}

/// A stored document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetailsModel {
    #[serde(default = "default_cipher")]
    pub cipher: CipherAlgorithms,
    /// Id of the key ciphering the document.
    pub key_id: Option<String>,
    pub name: String,
    /// Chain id and record number of the previous version.
    pub previous_version: Option<String>,
    pub content_type: String,
    /// Derived from the content; equal across chains for equal content.
    pub file_id: String,
    #[serde(rename = "physicalDocumentID")]
    pub physical_document_id: Option<String>,
}

impl Model for DocumentDetailsModel {}

impl DocumentDetailsModel {
    pub fn is_ciphered(&self) -> bool {
        self.cipher != CipherAlgorithms::None
    }

    pub fn is_plain_text(&self) -> bool {
        self.content_type == PLAIN_TEXT
    }
}

impl fmt::Display for DocumentDetailsModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Document '{}' [{}] {}",
            self.name, self.content_type, self.file_id
        )
    }
}

/// Document to upload; the bytes travel as the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUploadModel {
    #[serde(default = "default_cipher")]
    pub cipher: CipherAlgorithms,
    pub key_id: Option<String>,
    pub name: String,
    pub previous_version: Option<String>,
    pub content_type: String,
}

impl Model for DocumentUploadModel {
    fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_text("contentType", &self.content_type)
    }
}

impl DocumentUploadModel {
    pub fn new(name: &str, content_type: &str) -> Result<Self> {
        let model = Self {
            cipher: CipherAlgorithms::None,
            key_id: None,
            name: name.to_string(),
            previous_version: None,
            content_type: content_type.to_string(),
        };
        model.validate()?;
        Ok(model)
    }

    pub fn to_query_string(&self) -> String {
        build_query(&[
            ("cipher", Some(self.cipher.to_string())),
            ("name", Some(self.name.clone())),
            ("keyId", self.key_id.clone()),
            ("previousVersion", self.previous_version.clone()),
        ])
    }
}

/// Document content as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocumentModel {
    pub content_type: String,
    #[serde(with = "base64_bytes")]
    pub content: Vec<u8>,
    pub name: String,
}

impl Model for RawDocumentModel {
    fn validate(&self) -> Result<()> {
        require_text("name", &self.name)?;
        require_text("contentType", &self.content_type)
    }
}

impl RawDocumentModel {
    pub fn new(name: &str, content_type: &str, content: Vec<u8>) -> Result<Self> {
        let model = Self {
            content_type: content_type.to_string(),
            content,
            name: name.to_string(),
        };
        model.validate()?;
        Ok(model)
    }

    fn preview(&self) -> String {
        if self.content.is_empty() {
            return "?".to_string();
        }
        let text = if self.content_type == PLAIN_TEXT {
            String::from_utf8_lossy(&self.content).into_owned()
        } else {
            STANDARD.encode(&self.content)
        };
        match text.char_indices().nth(PREVIEW_LENGTH) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text,
        }
    }
}

impl fmt::Display for RawDocumentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Document '{}' [{}]\n{}",
            self.name,
            self.content_type,
            self.preview()
        )
    }
}
