//! IL2 REST - Typed Client for InterlockLedger Nodes
//!
//! A client library for the REST API of an InterlockLedger (IL2) node. It opens
//! the PKCS#12 client certificate a node issues to its API users, talks to the
//! node over mutually authenticated HTTPS, and turns the node's JSON into typed
//! models.
//!
//! # Overview
//!
//! ```text
//! RestNode (certificate + base address, lazy HTTPS session)
//!   └── RestChain (one chain of the node)
//!       ├── records / JSON documents / multi-document transactions
//!       └── keys, apps and interlocks permitted on the chain
//! ```
//!
//! Besides the transport, the library holds the pieces that do not need a
//! node at all:
//! - **Model marshalling**: every wire body is a serde model implementing [`marshal::Model`]
//! - **Encrypted JSON documents**: [`encryption::EncryptedTextModel`] opens a
//!   document with the reader's certificate (RSA-OAEP wrapped AES-256-CBC)
//! - **Reader identity**: IL2 key ids and public key hashes computed from X.509
//!   certificates in [`certificate`]
//! - **Value helpers**: ILInt varints, timestamps, tag ranges, node addresses
//!
//! # Quick Start
//!
//! ```no_run
//! use il2_rest::client::RestNode;
//!
//! fn main() -> il2_rest::Result<()> {
//!     let node = RestNode::new("rest.api.pfx", "password", "node.il2", Some(32020), true)?;
//!     println!("{}", node.details()?);
//!
//!     for chain in node.chains()? {
//!         println!("{}", chain);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! ## [`client`]
//!
//! [`client::RestNode`] and [`client::RestChain`]. Node refusals come back as
//! [`Il2Error::Node`] carrying the HTTP status and the node's message.
//!
//! ## [`certificate`]
//!
//! PKCS#12 loading, PEM export for TLS client authentication, and the key id
//! and public key hash that identify a reader of encrypted documents.
//!
//! ```no_run
//! use il2_rest::certificate::Pkcs12Certificate;
//!
//! let certificate = Pkcs12Certificate::load("reader.pfx", "password")?;
//! println!("{} {:?}", certificate.key_id()?, certificate.public_key_hash()?);
//! # Ok::<(), il2_rest::Il2Error>(())
//! ```
//!
//! ## [`encryption`]
//!
//! Decrypts the JSON documents a chain stores for a set of readers.
//!
//! ```no_run
//! use il2_rest::certificate::Pkcs12Certificate;
//! use il2_rest::client::RestNode;
//!
//! let node = RestNode::new("rest.api.pfx", "password", "node.il2", None, true)?;
//! let reader = Pkcs12Certificate::load("reader.pfx", "password")?;
//!
//! let chain = node.chain_by_id("UPmK1Ywqos6d1U1pMjhDX1k9cY4pWbySvZ6EqMXfLQ4")?;
//! let record = chain.json_document_at(12)?;
//! if let Some(encrypted) = record.encrypted_json {
//!     println!("{}", encrypted.decode_with(&reader)?);
//! }
//! # Ok::<(), il2_rest::Il2Error>(())
//! ```
//!
//! ## [`models`] and [`marshal`]
//!
//! Wire models with camelCase field names. Decoding reports a missing
//! required field as [`Il2Error::MissingField`] and a malformed one as
//! [`Il2Error::InvalidValue`]; models with construction rules are re-validated
//! after every decode.
//!
//! ## [`config`]
//!
//! `il2-rest.toml` with the certificate and node address to use.
//!
//! # Error Handling
//!
//! Library operations return [`Result`], whose [`Il2Error`] has one variant per
//! failure cause. Configuration loading returns `anyhow::Result` with context.

pub mod certificate;
pub mod client;
pub mod config;
pub mod encryption;
pub mod enumerations;
pub mod error;
pub mod ilint;
pub mod marshal;
pub mod models;
pub mod range;
pub mod uri;
pub mod util;

#[cfg(test)]
mod test_utils;

pub use error::{Il2Error, Result};
