//! Error types for the IL2 REST client.
//!
//! Every failure mode maps to exactly one variant so callers can branch on the
//! cause, e.g. telling a reader that is not authorized apart from a corrupt
//! ciphertext.

use thiserror::Error;

/// Errors produced by the marshalling, certificate and decryption layers.
#[derive(Debug, Error)]
pub enum Il2Error {
    /// Constructor arguments are malformed or insufficient.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A required field is absent from wire JSON.
    #[error("{0}")]
    MissingField(String),

    /// A field holds a value outside its closed set (unknown enum tag, bad base64, ...).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// Timestamp or range text could not be parsed.
    #[error("format error: {0}")]
    Format(String),

    /// The PKCS#12 bundle could not be opened with the given password.
    #[error("unable to open certificate bundle: {0}")]
    Authentication(String),

    #[error("cipher {0} is not currently supported")]
    UnsupportedCipher(String),

    #[error("certificate has no private key")]
    MissingKey,

    #[error("key {key_id} does not match any of the authorized reading keys")]
    UnauthorizedReader { key_id: String },

    #[error("unexpected payload framing: {0}")]
    Framing(String),

    #[error("invalid decrypted payload: {0}")]
    InvalidPayload(String),

    #[error("cryptographic operation failed: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport failure, propagated as returned by the HTTP client.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The node answered with a 4xx/5xx status.
    #[error("node returned {status}: {message}")]
    Node { status: u16, message: String },
}

impl From<serde_json::Error> for Il2Error {
    fn from(e: serde_json::Error) -> Self {
        let message = e.to_string();
        if message.starts_with("missing field") {
            Il2Error::MissingField(message)
        } else {
            Il2Error::InvalidValue(message)
        }
    }
}

pub type Result<T> = std::result::Result<T, Il2Error>;
