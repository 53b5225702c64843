//! Permitted keys and client certificates.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::certificate::Pkcs12Certificate;
use crate::enumerations::KeyPurpose;
use crate::error::{Il2Error, Result};
use crate::marshal::Model;
use crate::models::app::AppPermissions;

/// A key a chain recognizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyModel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<AppPermissions>,
    pub public_key: Option<String>,
    #[serde(default)]
    pub purposes: Vec<KeyPurpose>,
}

impl Model for KeyModel {}

impl KeyModel {
    /// The key can sign app actions.
    pub fn actionable(&self) -> bool {
        self.purposes.contains(&KeyPurpose::Action)
    }
}

impl fmt::Display for KeyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let purposes: Vec<&str> = self.purposes.iter().map(|p| p.as_str()).collect();
        write!(
            f,
            "Key '{}' {}\n\tPurposes: [{}]\n\t",
            self.name,
            self.id,
            purposes.join(",")
        )?;
        if self.permissions.is_empty() {
            write!(f, "No actions permitted!")
        } else {
            write!(f, "Actions permitted:")?;
            for permission in &self.permissions {
                write!(f, "\n\t  {}", permission.describe())?;
            }
            Ok(())
        }
    }
}

fn check_permit(permissions: &[AppPermissions], purposes: &[KeyPurpose]) -> Result<()> {
    if permissions.is_empty() {
        return Err(Il2Error::Validation(
            "this key doesn't have at least one action to be permitted".to_string(),
        ));
    }
    if !purposes.contains(&KeyPurpose::Action) && !purposes.contains(&KeyPurpose::Protocol) {
        return Err(Il2Error::Validation(
            "this key doesn't have the required purposes to be permitted".to_string(),
        ));
    }
    Ok(())
}

/// Key to be permitted on a chain.
///
/// Needs at least one app permission and either the `Action` or the
/// `Protocol` purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPermitModel {
    pub id: String,
    pub name: String,
    pub permissions: Vec<AppPermissions>,
    pub public_key: String,
    pub purposes: Vec<KeyPurpose>,
}

impl Model for KeyPermitModel {
    fn validate(&self) -> Result<()> {
        check_permit(&self.permissions, &self.purposes)
    }
}

impl KeyPermitModel {
    pub fn new(
        id: &str,
        name: &str,
        public_key: &str,
        permissions: Vec<AppPermissions>,
        purposes: Vec<KeyPurpose>,
    ) -> Result<Self> {
        let permit = Self {
            id: id.to_string(),
            name: name.to_string(),
            permissions,
            public_key: public_key.to_string(),
            purposes,
        };
        permit.validate()?;
        Ok(permit)
    }

    /// Permit for a single app and the listed actions of it.
    pub fn for_app(
        id: &str,
        name: &str,
        public_key: &str,
        app: u64,
        actions: Vec<u64>,
        purposes: Vec<KeyPurpose>,
    ) -> Result<Self> {
        Self::new(
            id,
            name,
            public_key,
            vec![AppPermissions::new(app, actions)],
            purposes,
        )
    }
}

/// The name given to a certificate permit differs from the certificate's CN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMismatch {
    pub requested: String,
    pub common_name: String,
}

impl fmt::Display for NameMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "name '{}' does not match the certificate common name '{}'",
            self.requested, self.common_name
        )
    }
}

/// Client certificate to be permitted on a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificatePermitModel {
    pub name: String,
    pub permissions: Vec<AppPermissions>,
    pub purposes: Vec<KeyPurpose>,
    /// Standard base64 of the DER certificate.
    #[serde(rename = "certificateInX509")]
    pub certificate_in_x509: String,
}

impl Model for CertificatePermitModel {
    fn validate(&self) -> Result<()> {
        check_permit(&self.permissions, &self.purposes)
    }
}

impl CertificatePermitModel {
    pub fn new(
        name: &str,
        permissions: Vec<AppPermissions>,
        purposes: Vec<KeyPurpose>,
        certificate_in_x509: &str,
    ) -> Result<Self> {
        let permit = Self {
            name: name.to_string(),
            permissions,
            purposes,
            certificate_in_x509: certificate_in_x509.to_string(),
        };
        permit.validate()?;
        Ok(permit)
    }

    /// Build the permit from a loaded certificate.
    ///
    /// Returns a [`NameMismatch`] next to the permit when `name` is not the
    /// certificate's common name; the node will register it under `name`.
    pub fn from_certificate(
        name: &str,
        permissions: Vec<AppPermissions>,
        purposes: Vec<KeyPurpose>,
        certificate: &Pkcs12Certificate,
    ) -> Result<(Self, Option<NameMismatch>)> {
        let encoded = STANDARD.encode(certificate.certificate_der()?);
        let permit = Self::new(name, permissions, purposes, &encoded)?;

        let common_name = certificate.common_name();
        let mismatch = (common_name != name).then(|| NameMismatch {
            requested: name.to_string(),
            common_name,
        });
        Ok((permit, mismatch))
    }
}
