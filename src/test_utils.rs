//! Certificate fixtures for unit tests.
//!
//! Builds self-signed RSA client certificates and wraps them into password
//! protected PKCS#12 bundles, the same shape a node hands out.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Name, X509};
use serde_json::Value;

use crate::certificate::Pkcs12Certificate;
use crate::marshal::Model;
use crate::util::filter_null;

const X509_VERSION_3: i32 = 2;
const RSA_KEY_SIZE_TEST: u32 = 2048;

pub const TEST_PASSWORD: &str = "il2-test-password";

/// Builder for self-signed client certificates
pub struct ClientCertificateBuilder {
    common_name: String,
    friendly_name: String,
    validity_days: u32,
}

impl ClientCertificateBuilder {
    pub fn new(common_name: &str) -> Self {
        Self {
            common_name: common_name.to_string(),
            friendly_name: common_name.to_string(),
            validity_days: 30,
        }
    }

    pub fn friendly_name(mut self, name: &str) -> Self {
        self.friendly_name = name.to_string();
        self
    }

    /// Generate the key pair and self-signed certificate.
    pub fn build(&self) -> Result<(PKey<Private>, X509)> {
        let rsa = Rsa::generate(RSA_KEY_SIZE_TEST)
            .map_err(|e| anyhow!("Failed to generate RSA keypair: {}", e))?;
        let private_key = PKey::from_rsa(rsa)?;

        let mut builder = X509::builder()?;
        builder.set_version(X509_VERSION_3)?;

        let mut serial = BigNum::new()?;
        serial.rand(128, MsbOption::MAYBE_ZERO, false)?;
        let asn1_serial = serial.to_asn1_integer()?;
        builder.set_serial_number(&asn1_serial)?;

        let mut name_builder = X509Name::builder()?;
        name_builder
            .append_entry_by_nid(Nid::COMMONNAME, &self.common_name)
            .map_err(|e| anyhow!("Failed to set CN: {}", e))?;
        let name = name_builder.build();
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;

        let not_before = Asn1Time::days_from_now(0)?;
        let not_after = Asn1Time::days_from_now(self.validity_days)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;
        builder.set_pubkey(&private_key)?;

        builder.append_extension(BasicConstraints::new().critical().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .data_encipherment()
                .build()?,
        )?;

        builder
            .sign(&private_key, MessageDigest::sha256())
            .map_err(|e| anyhow!("Failed to sign certificate: {}", e))?;

        Ok((private_key, builder.build()))
    }

    /// Generate a certificate and return it as a DER encoded PKCS#12 bundle.
    pub fn build_pkcs12(&self, password: &str) -> Result<Vec<u8>> {
        let (key, cert) = self.build()?;
        let bundle = Pkcs12::builder()
            .name(&self.friendly_name)
            .pkey(&key)
            .cert(&cert)
            .build2(password)?;
        Ok(bundle.to_der()?)
    }
}

/// Bundle shared by tests that only need some valid reader.
pub static READER_BUNDLE: Lazy<Vec<u8>> = Lazy::new(|| {
    ClientCertificateBuilder::new("reader.il2")
        .friendly_name("Reader Key")
        .build_pkcs12(TEST_PASSWORD)
        .expect("fixture bundle")
});

/// Second, unrelated bundle.
pub static OUTSIDER_BUNDLE: Lazy<Vec<u8>> = Lazy::new(|| {
    ClientCertificateBuilder::new("outsider.il2")
        .build_pkcs12(TEST_PASSWORD)
        .expect("fixture bundle")
});

pub fn reader() -> Pkcs12Certificate {
    Pkcs12Certificate::from_der(&READER_BUNDLE, TEST_PASSWORD).expect("reader bundle opens")
}

pub fn outsider() -> Pkcs12Certificate {
    Pkcs12Certificate::from_der(&OUTSIDER_BUNDLE, TEST_PASSWORD).expect("outsider bundle opens")
}

/// Decode wire JSON into `T` and check it encodes back to the same JSON,
/// minus null entries.
pub fn assert_wire_round_trip<T: Model>(wire: Value) {
    let decoded = T::from_json(wire.clone()).expect("wire JSON decodes");
    assert_eq!(decoded.to_json(true).expect("model encodes"), filter_null(wire));
}
