//! Node base addresses.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Il2Error, Result};

static ADDRESS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9a-zA-Z][0-9a-zA-Z\-\.]*[0-9a-zA-Z]):?([0-9]+)?/?$")
        .expect("address pattern is valid")
});

static SCHEME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:/]+)(?:://)?$").expect("scheme pattern is valid"));

/// `scheme://hostname[:port]/` address of an IL2 node.
///
/// A scheme or port embedded in the address wins over the ones passed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleUri {
    scheme: String,
    hostname: String,
    port: Option<u16>,
}

impl SimpleUri {
    pub fn new(address: &str, port: Option<u16>) -> Result<Self> {
        Self::with_scheme(address, port, "https")
    }

    pub fn with_scheme(address: &str, port: Option<u16>, scheme: &str) -> Result<Self> {
        let mut scheme = Self::treat_scheme(scheme)?;
        let mut port = port;

        let (embedded_scheme, hostname, embedded_port) = Self::split_address(address)?;
        if let Some(s) = embedded_scheme {
            scheme = s;
        }
        if let Some(p) = embedded_port {
            port = Some(p);
        }

        Ok(Self {
            scheme,
            hostname,
            port,
        })
    }

    fn split_address(address: &str) -> Result<(Option<String>, String, Option<u16>)> {
        let invalid = || {
            Il2Error::Validation(format!(
                "invalid address '{}', must be in format [scheme://]hostname[:port][/]",
                address
            ))
        };

        let (scheme, rest) = match address.split_once("://") {
            Some((scheme, rest)) if !scheme.is_empty() && !scheme.contains(':') => {
                (Some(scheme.to_string()), rest)
            }
            Some(_) => return Err(invalid()),
            None => (None, address),
        };

        let captures = ADDRESS_PATTERN.captures(rest).ok_or_else(invalid)?;
        let hostname = captures[1].to_string();
        let port = match captures.get(2) {
            Some(p) => Some(p.as_str().parse::<u16>().map_err(|_| invalid())?),
            None => None,
        };
        Ok((scheme, hostname, port))
    }

    fn treat_scheme(scheme: &str) -> Result<String> {
        SCHEME_PATTERN
            .captures(scheme)
            .map(|c| c[1].to_string())
            .ok_or_else(|| {
                Il2Error::Validation(
                    "invalid protocol scheme, must be in format scheme[://]".to_string(),
                )
            })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Full URL for `path`; leading slashes of `path` are ignored.
    pub fn build(&self, path: &str) -> String {
        format!("{}{}", self, path.trim_start_matches('/'))
    }
}

impl fmt::Display for SimpleUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}://{}:{}/", self.scheme, self.hostname, port),
            None => write!(f, "{}://{}/", self.scheme, self.hostname),
        }
    }
}
