//! Closed value sets used by the node API.
//!
//! Every enumeration travels as its name string. Parsing an unknown name
//! fails with [`Il2Error::InvalidValue`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Il2Error, Result};

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Name used on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Il2Error;

            fn from_str(s: &str) -> Result<Self> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(Il2Error::InvalidValue(format!(
                        "'{}' is not a valid {}",
                        other,
                        stringify!($name)
                    ))),
                }
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

wire_enum! {
    /// Digital signature algorithms.
    pub enum Algorithms {
        /// PKCS#1 RSASSA-PSS
        Rsa => "RSA",
        /// RSASSA-PKCS1-v1_5
        Rsa15 => "RSA15",
        Dsa => "DSA",
        ElGamal => "ElGamal",
        EcDsa => "EcDSA",
        EdDsa => "EdDSA",
    }
}

wire_enum! {
    /// How a data field is interpreted by the node.
    pub enum DataFieldCast {
        None => "None",
        DateTime => "DateTime",
        Integer => "Integer",
        TimeSpan => "TimeSpan",
    }
}

wire_enum! {
    pub enum CipherAlgorithms {
        None => "None",
        Aes256 => "AES256",
    }
}

wire_enum! {
    pub enum HashAlgorithms {
        Sha256 => "SHA256",
        Sha1 => "SHA1",
        Sha512 => "SHA512",
        Sha3_256 => "SHA3_256",
        Sha3_512 => "SHA3_512",
        Copy => "Copy",
    }
}

wire_enum! {
    /// What a permitted key may be used for.
    pub enum KeyPurpose {
        Action => "Action",
        ChainOperation => "ChainOperation",
        Encryption => "Encryption",
        ForceInterlock => "ForceInterlock",
        KeyManagement => "KeyManagement",
        Protocol => "Protocol",
        InvalidKey => "InvalidKey",
        ClaimSigner => "ClaimSigner",
    }
}

wire_enum! {
    /// RSA key sizes, from 2048 (Normal) to 8192 (UltraStrong) bits.
    pub enum KeyStrength {
        Normal => "Normal",
        Strong => "Strong",
        ExtraStrong => "ExtraStrong",
        MegaStrong => "MegaStrong",
        SuperStrong => "SuperStrong",
        HyperStrong => "HyperStrong",
        UltraStrong => "UltraStrong",
    }
}

wire_enum! {
    pub enum NetworkProtocol {
        TcpDirect => "TCP_Direct",
        TcpProxied => "TCP_Proxied",
        HttpsProxied => "HTTPS_Proxied",
        OriginatorOnly => "Originator_Only",
    }
}

wire_enum! {
    pub enum RecordType {
        Data => "Data",
        Root => "Root",
        Closing => "Closing",
        EmergencyClosing => "EmergencyClosing",
        Corrupted => "Corrupted",
    }
}

wire_enum! {
    pub enum DocumentsCompression {
        None => "NONE",
        Gzip => "GZIP",
        Brotli => "BROTLI",
        Zstd => "ZSTD",
    }
}

impl KeyStrength {
    /// RSA modulus size in bits.
    pub fn rsa_bits(&self) -> u32 {
        match self {
            KeyStrength::Normal => 2048,
            KeyStrength::Strong => 3072,
            KeyStrength::ExtraStrong => 4096,
            KeyStrength::MegaStrong => 5120,
            KeyStrength::SuperStrong => 6144,
            KeyStrength::HyperStrong => 7172,
            KeyStrength::UltraStrong => 8192,
        }
    }
}

/// Default API ports of the public IL2 networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum NetworkPredefinedPorts {
    MainNet = 32032,
    MetaNet = 32036,
    Jupiter = 32030,
    Saturn = 32028,
    Neptune = 32026,
    Minerva = 32024,
    Janus = 32022,
    Apollo = 32020,
    Liber = 32018,
}

impl NetworkPredefinedPorts {
    pub fn port(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names_round_trip() {
        for purpose in KeyPurpose::ALL {
            assert_eq!(purpose.as_str().parse::<KeyPurpose>().unwrap(), *purpose);
        }
        assert_eq!(NetworkProtocol::TcpDirect.to_string(), "TCP_Direct");
        assert_eq!(DocumentsCompression::None.as_str(), "NONE");
        assert_eq!(DataFieldCast::None.as_str(), "None");
    }

    #[test]
    fn test_unknown_value_rejected() {
        let err = "AES128".parse::<CipherAlgorithms>().unwrap_err();
        assert!(matches!(err, Il2Error::InvalidValue(_)));
        assert!(serde_json::from_str::<RecordType>("\"Genesis\"").is_err());
    }

    #[test]
    fn test_serde_uses_wire_name() {
        assert_eq!(serde_json::to_string(&HashAlgorithms::Sha3_256).unwrap(), "\"SHA3_256\"");
        let parsed: Algorithms = serde_json::from_str("\"EcDSA\"").unwrap();
        assert_eq!(parsed, Algorithms::EcDsa);
    }

    #[test]
    fn test_predefined_ports() {
        assert_eq!(NetworkPredefinedPorts::MainNet.port(), 32032);
        assert_eq!(NetworkPredefinedPorts::Minerva.port(), 32024);
        assert_eq!(KeyStrength::ExtraStrong.rsa_bits(), 4096);
    }
}
