//! Client Certificate Adapter
//!
//! Opens the PKCS#12 bundle a node issues to its API clients and exposes what
//! the rest of the crate needs from it:
//! - the PEM key/certificate pair used for TLS client authentication
//! - the IL2 key id and public key hash that identify a reader
//! - RSA-OAEP decryption of wrapped symmetric keys
//!
//! Private key material never shows up in `Debug` output. PEM exports are
//! wrapped in `secrecy` containers and zeroized on drop.

use std::fmt;
use std::io::Write;
use std::path::Path;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{Id, PKey, Private};
use openssl::rsa::Padding;
use openssl::x509::X509;
use secrecy::{ExposeSecret, SecretVec};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Il2Error, Result};
use crate::ilint::{encode_raw_tag, BYTE_ARRAY_TAG, RSA_PARAMETERS_TAG};

/// Certificate and optional private key loaded from a PKCS#12 bundle
pub struct Pkcs12Certificate {
    private_key: Option<PKey<Private>>,
    certificate: X509,
    friendly_name: String,
}

impl Pkcs12Certificate {
    /// Load a `.pfx` bundle from disk
    ///
    /// # Arguments
    /// * `path` - Location of the PKCS#12 file
    /// * `password` - Password protecting the bundle
    ///
    /// # Returns
    /// * `Err(Il2Error::Io)` - The file could not be read
    /// * `Err(Il2Error::Authentication)` - Wrong password or corrupt bundle
    pub fn load<P: AsRef<Path>>(path: P, password: &str) -> Result<Self> {
        let der = std::fs::read(path.as_ref())?;
        let certificate = Self::from_der(&der, password)?;
        debug!(
            path = %path.as_ref().display(),
            common_name = %certificate.common_name(),
            "loaded client certificate"
        );
        Ok(certificate)
    }

    /// Open a DER encoded PKCS#12 bundle already in memory
    pub fn from_der(der: &[u8], password: &str) -> Result<Self> {
        let parsed = Pkcs12::from_der(der)
            .and_then(|bundle| bundle.parse2(password))
            .map_err(|e| Il2Error::Authentication(e.to_string()))?;

        let certificate = parsed.cert.ok_or_else(|| {
            Il2Error::Authentication("bundle does not contain a certificate".to_string())
        })?;
        let friendly_name = certificate
            .alias()
            .map(|alias| String::from_utf8_lossy(alias).into_owned())
            .unwrap_or_default();

        Ok(Self {
            private_key: parsed.pkey,
            certificate,
            friendly_name,
        })
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn has_private_key(&self) -> bool {
        self.private_key.is_some()
    }

    /// Subject common name, empty when the certificate has none.
    pub fn common_name(&self) -> String {
        self.certificate
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().as_utf8().ok())
            .map(|cn| cn.to_string())
            .unwrap_or_default()
    }

    /// Friendly name stored in the bundle, empty when absent.
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Private key as unencrypted PKCS#8 PEM
    pub fn private_key_pem(&self) -> Result<SecretVec<u8>> {
        let key = self.private_key.as_ref().ok_or(Il2Error::MissingKey)?;
        Ok(SecretVec::new(key.private_key_to_pem_pkcs8()?))
    }

    pub fn public_certificate_pem(&self) -> Result<Vec<u8>> {
        Ok(self.certificate.to_pem()?)
    }

    pub fn certificate_der(&self) -> Result<Vec<u8>> {
        Ok(self.certificate.to_der()?)
    }

    /// RSA modulus as minimal big-endian bytes, `None` for non-RSA keys.
    pub fn public_modulus(&self) -> Result<Option<Vec<u8>>> {
        Ok(rsa_components(&self.certificate)?.map(|(n, _)| n))
    }

    /// RSA public exponent as minimal big-endian bytes, `None` for non-RSA keys.
    pub fn public_exponent(&self) -> Result<Option<Vec<u8>>> {
        Ok(rsa_components(&self.certificate)?.map(|(_, e)| e))
    }

    /// `Key!<digest>#SHA1` identifier of this certificate
    pub fn key_id(&self) -> Result<String> {
        key_id_of(&self.certificate)
    }

    /// `<digest>#SHA256` hash of the RSA public parameters
    pub fn public_key_hash(&self) -> Result<Option<String>> {
        public_key_hash_of(&self.certificate)
    }

    /// Decrypt with RSA-OAEP (SHA-1 digest and MGF1, no label)
    ///
    /// # Arguments
    /// * `ciphertext` - Block produced with the certificate's public key
    ///
    /// # Returns
    /// * `Err(Il2Error::MissingKey)` - The bundle carried no private key
    /// * `Err(Il2Error::Crypto)` - The block was not encrypted for this key
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let key = self.private_key.as_ref().ok_or(Il2Error::MissingKey)?;
        let rsa = key.rsa()?;
        let mut plaintext = vec![0u8; rsa.size() as usize];
        let len = rsa.private_decrypt(ciphertext, &mut plaintext, Padding::PKCS1_OAEP)?;
        plaintext.truncate(len);
        Ok(plaintext)
    }
}

impl fmt::Debug for Pkcs12Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pkcs12Certificate")
            .field("common_name", &self.common_name())
            .field("friendly_name", &self.friendly_name)
            .field(
                "private_key",
                &if self.has_private_key() {
                    "<securely stored>"
                } else {
                    "<none>"
                },
            )
            .finish()
    }
}

fn rsa_components(certificate: &X509) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
    let public_key = certificate.public_key()?;
    if public_key.id() != Id::RSA {
        return Ok(None);
    }
    let rsa = public_key.rsa()?;
    Ok(Some((rsa.n().to_vec(), rsa.e().to_vec())))
}

/// `Key!` + unpadded URL-safe base64 of the SHA-1 of the DER certificate + `#SHA1`.
pub fn key_id_of(certificate: &X509) -> Result<String> {
    let digest = certificate.digest(MessageDigest::sha1())?;
    Ok(format!("Key!{}#SHA1", URL_SAFE_NO_PAD.encode(digest)))
}

/// Public key hash of any certificate, `None` when its key is not RSA.
pub fn public_key_hash_of(certificate: &X509) -> Result<Option<String>> {
    Ok(rsa_components(certificate)?.map(|(n, e)| public_key_hash_from_components(&n, &e)))
}

/// Hash of `ILTag(40, ILTag(16, modulus) ++ ILTag(16, exponent))`.
pub fn public_key_hash_from_components(modulus: &[u8], exponent: &[u8]) -> String {
    let mut parameters = encode_raw_tag(BYTE_ARRAY_TAG, modulus);
    parameters.extend(encode_raw_tag(BYTE_ARRAY_TAG, exponent));
    let frame = encode_raw_tag(RSA_PARAMETERS_TAG, &parameters);

    let digest = Sha256::digest(&frame);
    format!("{}#SHA256", URL_SAFE_NO_PAD.encode(digest))
}

/// Temporary PEM file holding a client's private key and certificate.
///
/// The file lives in the system temp directory with owner-only permissions
/// and is removed when this value is dropped, including on error paths.
pub struct CredentialFile {
    file: NamedTempFile,
}

impl CredentialFile {
    pub fn create(certificate: &Pkcs12Certificate) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("il2-credential-")
            .suffix(".pem")
            .tempfile()?;

        let key_pem = certificate.private_key_pem()?;
        file.write_all(key_pem.expose_secret())?;
        file.write_all(&certificate.public_certificate_pem()?)?;
        file.flush()?;

        debug!(path = %file.path().display(), "credential file created");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Contents of the file, key first.
    pub fn read(&self) -> Result<SecretVec<u8>> {
        Ok(SecretVec::new(std::fs::read(self.path())?))
    }
}

impl Drop for CredentialFile {
    fn drop(&mut self) {
        debug!(path = %self.file.path().display(), "removing credential file");
    }
}

impl fmt::Debug for CredentialFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialFile")
            .field("path", &self.path())
            .finish()
    }
}
