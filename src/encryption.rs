//! Encrypted JSON payloads
//!
//! Encrypted JSON documents travel as an AES-256-CBC ciphertext plus one
//! [`ReadingKeyModel`] per authorized reader. Each reading key carries the AES
//! key and IV wrapped with that reader's RSA public key (OAEP, SHA-1).
//!
//! The decrypted plaintext is framed as
//! ```text
//! [0x11][ILInt length N][N bytes of UTF-8 JSON][ignored trailing bytes]
//! ```

use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use once_cell::sync::Lazy;
use openssl::rsa::Padding;
use openssl::symm::{Cipher, Crypter, Mode};
use openssl::x509::X509;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::certificate::{key_id_of, public_key_hash_of, Pkcs12Certificate};
use crate::enumerations::CipherAlgorithms;
use crate::error::{Il2Error, Result};
use crate::ilint;
use crate::marshal::Model;

/// First byte of every decrypted payload.
pub const PAYLOAD_MARKER: u8 = 0x11;
/// Size of AES-256 key (256 bits = 32 bytes)
pub const AES_256_KEY_SIZE: usize = 32;
/// Size of the CBC initialization vector
pub const AES_CBC_IV_SIZE: usize = 16;

/// URL-safe alphabet, padding optional on input.
static URL_SAFE_LENIENT: Lazy<GeneralPurpose> = Lazy::new(|| {
    GeneralPurpose::new(
        &alphabet::URL_SAFE,
        GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
    )
});

fn decode_url_safe(field: &str, text: &str) -> Result<Vec<u8>> {
    URL_SAFE_LENIENT
        .decode(text.trim())
        .map_err(|e| Il2Error::InvalidValue(format!("{} is not valid base64: {}", field, e)))
}

/// AES key and IV wrapped for one reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingKeyModel {
    #[serde(rename = "encryptedIV")]
    pub encrypted_iv: String,
    pub encrypted_key: String,
    pub public_key_hash: String,
    pub reader_id: String,
}

impl Model for ReadingKeyModel {}

/// Ciphertext of a JSON document and the keys able to open it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedTextModel {
    pub cipher: CipherAlgorithms,
    pub cipher_text: String,
    #[serde(default)]
    pub reading_keys: Vec<ReadingKeyModel>,
}

impl Model for EncryptedTextModel {}

impl EncryptedTextModel {
    /// Decrypt the document with a reader's certificate
    ///
    /// # Arguments
    /// * `certificate` - Reader certificate holding the RSA private key
    ///
    /// # Returns
    /// * `Ok(Value)` - The decrypted JSON document
    /// * `Err(Il2Error::UnsupportedCipher)` - Cipher is not AES256
    /// * `Err(Il2Error::MissingKey)` - Certificate has no private key
    /// * `Err(Il2Error::UnauthorizedReader)` - No reading key matches the certificate
    /// * `Err(Il2Error::Framing)` - Decrypted bytes are not a framed payload
    /// * `Err(Il2Error::InvalidPayload)` - Ciphertext is truncated, or payload is not UTF-8 JSON
    pub fn decode_with(&self, certificate: &Pkcs12Certificate) -> Result<Value> {
        if self.cipher != CipherAlgorithms::Aes256 {
            return Err(Il2Error::UnsupportedCipher(self.cipher.to_string()));
        }
        if !certificate.has_private_key() {
            return Err(Il2Error::MissingKey);
        }

        let key_id = certificate.key_id()?;
        let public_key_hash = certificate.public_key_hash()?.ok_or_else(|| {
            Il2Error::Validation("non-RSA certificate is not currently supported".to_string())
        })?;

        let reading_key = self
            .reading_keys
            .iter()
            .find(|rk| rk.reader_id == key_id && rk.public_key_hash == public_key_hash)
            .ok_or_else(|| Il2Error::UnauthorizedReader {
                key_id: key_id.clone(),
            })?;
        debug!(reader_id = %key_id, "found matching reading key");

        let wrapped_key = decode_url_safe("encryptedKey", &reading_key.encrypted_key)?;
        let wrapped_iv = decode_url_safe("encryptedIV", &reading_key.encrypted_iv)?;
        let aes_key = certificate.decrypt(&wrapped_key)?;
        let aes_iv = certificate.decrypt(&wrapped_iv)?;

        let ciphertext = decode_url_safe("cipherText", &self.cipher_text)?;
        let plaintext = aes_decrypt(&ciphertext, &aes_key, &aes_iv)?;
        let json_bytes = unframe_payload(&plaintext)?;

        let text = std::str::from_utf8(json_bytes)
            .map_err(|e| Il2Error::InvalidPayload(format!("payload is not UTF-8: {}", e)))?;
        serde_json::from_str(text)
            .map_err(|e| Il2Error::InvalidPayload(format!("payload is not JSON: {}", e)))
    }

    /// Encrypt a JSON document for a set of readers
    ///
    /// Generates a fresh AES-256 key and IV, encrypts the framed document and
    /// wraps key and IV with each reader's RSA public key.
    ///
    /// # Arguments
    /// * `json` - Document to encrypt
    /// * `readers` - Certificates of the keys allowed to read it
    pub fn seal(json: &Value, readers: &[X509]) -> Result<Self> {
        if readers.is_empty() {
            return Err(Il2Error::Validation(
                "at least one reader is required".to_string(),
            ));
        }

        let mut aes_key = [0u8; AES_256_KEY_SIZE];
        openssl::rand::rand_bytes(&mut aes_key)?;
        let mut aes_iv = [0u8; AES_CBC_IV_SIZE];
        openssl::rand::rand_bytes(&mut aes_iv)?;

        let payload = frame_payload(serde_json::to_string(json)?.as_bytes());
        let ciphertext = aes_encrypt(&payload, &aes_key, &aes_iv)?;

        let reading_keys = readers
            .iter()
            .map(|reader| -> Result<ReadingKeyModel> {
                let public_key_hash = public_key_hash_of(reader)?.ok_or_else(|| {
                    Il2Error::Validation("non-RSA reader is not currently supported".to_string())
                })?;
                let rsa = reader.public_key()?.rsa()?;
                let wrap = |data: &[u8]| -> Result<String> {
                    let mut wrapped = vec![0u8; rsa.size() as usize];
                    let len = rsa.public_encrypt(data, &mut wrapped, Padding::PKCS1_OAEP)?;
                    wrapped.truncate(len);
                    Ok(URL_SAFE.encode(wrapped))
                };
                Ok(ReadingKeyModel {
                    encrypted_iv: wrap(&aes_iv)?,
                    encrypted_key: wrap(&aes_key)?,
                    public_key_hash,
                    reader_id: key_id_of(reader)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            cipher: CipherAlgorithms::Aes256,
            cipher_text: URL_SAFE.encode(ciphertext),
            reading_keys,
        })
    }
}

/// `[0x11][ILInt len][bytes]`
pub fn frame_payload(json: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(1 + ilint::encoded_size(json.len() as u64) + json.len());
    framed.push(PAYLOAD_MARKER);
    ilint::encode(json.len() as u64, &mut framed);
    framed.extend_from_slice(json);
    framed
}

/// Extract the framed bytes, ignoring anything after them.
pub fn unframe_payload(plaintext: &[u8]) -> Result<&[u8]> {
    match plaintext.first() {
        Some(&PAYLOAD_MARKER) => {}
        Some(other) => {
            return Err(Il2Error::Framing(format!(
                "unexpected initial byte {:#04x}",
                other
            )))
        }
        None => return Err(Il2Error::Framing("empty payload".to_string())),
    }

    let (length, used) = ilint::decode(&plaintext[1..])?;
    let start = 1 + used;
    let end = usize::try_from(length)
        .ok()
        .and_then(|length| start.checked_add(length))
        .filter(|end| *end <= plaintext.len())
        .ok_or_else(|| {
            Il2Error::Framing(format!(
                "payload declares {} bytes but only {} are available",
                length,
                plaintext.len() - start
            ))
        })?;
    Ok(&plaintext[start..end])
}

fn check_key_and_iv(key: &[u8], iv: &[u8]) -> Result<()> {
    if key.len() != AES_256_KEY_SIZE {
        return Err(Il2Error::Framing(format!(
            "AES key must be {} bytes, got {}",
            AES_256_KEY_SIZE,
            key.len()
        )));
    }
    if iv.len() != AES_CBC_IV_SIZE {
        return Err(Il2Error::Framing(format!(
            "AES IV must be {} bytes, got {}",
            AES_CBC_IV_SIZE,
            iv.len()
        )));
    }
    Ok(())
}

/// AES-256-CBC decryption without removing padding.
pub fn aes_decrypt(ciphertext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_key_and_iv(key, iv)?;
    let cipher = Cipher::aes_256_cbc();
    if ciphertext.len() % cipher.block_size() != 0 {
        return Err(Il2Error::InvalidPayload(format!(
            "ciphertext of {} bytes is not a whole number of AES blocks",
            ciphertext.len()
        )));
    }
    let mut crypter = Crypter::new(cipher, Mode::Decrypt, key, Some(iv))?;
    crypter.pad(false);

    let mut plaintext = vec![0u8; ciphertext.len() + cipher.block_size()];
    let mut count = crypter.update(ciphertext, &mut plaintext)?;
    count += crypter.finalize(&mut plaintext[count..])?;
    plaintext.truncate(count);
    Ok(plaintext)
}

/// AES-256-CBC encryption with PKCS#7 padding.
pub fn aes_encrypt(plaintext: &[u8], key: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    check_key_and_iv(key, iv)?;
    Ok(openssl::symm::encrypt(
        Cipher::aes_256_cbc(),
        key,
        Some(iv),
        plaintext,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{outsider, reader};
    use serde_json::json;

    fn sealed_for_reader(document: &Value) -> EncryptedTextModel {
        EncryptedTextModel::seal(document, &[reader().certificate().clone()]).unwrap()
    }

    #[test]
    fn test_seal_then_decode() {
        let document = json!({"a": 1});
        let sealed = sealed_for_reader(&document);
        assert_eq!(sealed.cipher, CipherAlgorithms::Aes256);
        assert_eq!(sealed.reading_keys.len(), 1);
        assert_eq!(sealed.decode_with(&reader()).unwrap(), document);
    }

    #[test]
    fn test_multiple_readers_can_decode() {
        let document = json!({"attribute_1": "value_1", "number_1": 1, "nested": [true, null]});
        let readers = [outsider().certificate().clone(), reader().certificate().clone()];
        let sealed = EncryptedTextModel::seal(&document, &readers).unwrap();

        assert_eq!(sealed.decode_with(&reader()).unwrap(), document);
        assert_eq!(sealed.decode_with(&outsider()).unwrap(), document);
    }

    #[test]
    fn test_unknown_reader_rejected() {
        let sealed = sealed_for_reader(&json!({"a": 1}));
        let err = sealed.decode_with(&outsider()).unwrap_err();
        match err {
            Il2Error::UnauthorizedReader { key_id } => {
                assert_eq!(key_id, outsider().key_id().unwrap())
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_matching_id_with_wrong_hash_rejected() {
        let mut sealed = sealed_for_reader(&json!({"a": 1}));
        sealed.reading_keys[0].public_key_hash = "AAAA#SHA256".to_string();
        assert!(matches!(
            sealed.decode_with(&reader()),
            Err(Il2Error::UnauthorizedReader { .. })
        ));
    }

    #[test]
    fn test_empty_reading_keys_rejected() {
        let mut sealed = sealed_for_reader(&json!({"a": 1}));
        sealed.reading_keys.clear();
        assert!(matches!(
            sealed.decode_with(&reader()),
            Err(Il2Error::UnauthorizedReader { .. })
        ));
    }

    #[test]
    fn test_unsupported_cipher() {
        let mut sealed = sealed_for_reader(&json!({"a": 1}));
        sealed.cipher = CipherAlgorithms::None;
        assert!(matches!(
            sealed.decode_with(&reader()),
            Err(Il2Error::UnsupportedCipher(_))
        ));
    }

    #[test]
    fn test_unpadded_base64_accepted() {
        let document = json!({"a": 1});
        let mut sealed = sealed_for_reader(&document);
        sealed.cipher_text = sealed.cipher_text.trim_end_matches('=').to_string();
        for rk in sealed.reading_keys.iter_mut() {
            rk.encrypted_key = rk.encrypted_key.trim_end_matches('=').to_string();
            rk.encrypted_iv = rk.encrypted_iv.trim_end_matches('=').to_string();
        }
        assert_eq!(sealed.decode_with(&reader()).unwrap(), document);
    }

    #[test]
    fn test_bad_marker_is_framing_error() {
        let cert = reader();
        let sealed = sealed_for_reader(&json!({"a": 1}));
        let rk = &sealed.reading_keys[0];
        let key = cert.decrypt(&decode_url_safe("k", &rk.encrypted_key).unwrap()).unwrap();
        let iv = cert.decrypt(&decode_url_safe("iv", &rk.encrypted_iv).unwrap()).unwrap();

        let forged = aes_encrypt(b"\x12\x07{\"a\":1}", &key, &iv).unwrap();
        let tampered = EncryptedTextModel {
            cipher_text: URL_SAFE.encode(forged),
            ..sealed.clone()
        };
        assert!(matches!(tampered.decode_with(&cert), Err(Il2Error::Framing(_))));

        let not_json = aes_encrypt(&frame_payload(b"{not json"), &key, &iv).unwrap();
        let tampered = EncryptedTextModel {
            cipher_text: URL_SAFE.encode(not_json),
            ..sealed
        };
        assert!(matches!(
            tampered.decode_with(&cert),
            Err(Il2Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_truncated_ciphertext_is_invalid_payload() {
        let sealed = sealed_for_reader(&json!({"a": 1}));
        let mut ciphertext = decode_url_safe("c", &sealed.cipher_text).unwrap();
        ciphertext.pop();
        let truncated = EncryptedTextModel {
            cipher_text: URL_SAFE.encode(ciphertext),
            ..sealed
        };
        assert!(matches!(
            truncated.decode_with(&reader()),
            Err(Il2Error::InvalidPayload(_))
        ));
        assert!(matches!(
            aes_decrypt(&[0u8; 17], &[0u8; 32], &[0u8; 16]),
            Err(Il2Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_unframe_payload() {
        let framed = frame_payload(br#"{"a":1}"#);
        assert_eq!(&framed[..2], &[0x11, 7]);

        let mut padded = framed.clone();
        padded.extend_from_slice(&[9; 9]);
        assert_eq!(unframe_payload(&padded).unwrap(), br#"{"a":1}"#);

        assert!(matches!(unframe_payload(&[]), Err(Il2Error::Framing(_))));
        assert!(matches!(unframe_payload(&[0x11]), Err(Il2Error::Framing(_))));
        assert!(matches!(
            unframe_payload(&framed[..framed.len() - 1]),
            Err(Il2Error::Framing(_))
        ));
    }

    #[test]
    fn test_long_payload_uses_multibyte_length() {
        let body = vec![b' '; 1000];
        let framed = frame_payload(&body);
        assert_eq!(framed[1], 0xF9);
        assert_eq!(unframe_payload(&framed).unwrap().len(), 1000);
    }

    #[test]
    fn test_aes_rejects_bad_key_sizes() {
        assert!(matches!(
            aes_decrypt(&[0u8; 16], &[0u8; 16], &[0u8; 16]),
            Err(Il2Error::Framing(_))
        ));
        assert!(matches!(
            aes_encrypt(b"x", &[0u8; 32], &[0u8; 8]),
            Err(Il2Error::Framing(_))
        ));
    }

    #[test]
    fn test_wire_shape() {
        let sealed = sealed_for_reader(&json!({"a": 1}));
        let wire = sealed.to_json(true).unwrap();
        assert_eq!(wire["cipher"], "AES256");
        assert!(wire["cipherText"].is_string());
        let rk = &wire["readingKeys"][0];
        for field in ["encryptedIV", "encryptedKey", "publicKeyHash", "readerId"] {
            assert!(rk[field].is_string(), "missing {}", field);
        }

        let back = EncryptedTextModel::from_json(wire).unwrap();
        assert_eq!(back, sealed);
    }
}
