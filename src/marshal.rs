//! Model Marshalling
//!
//! Conversion between wire JSON and the typed models. Every model derives
//! serde's `Serialize`/`Deserialize` with its wire field names and implements
//! [`Model`], which adds null hiding on the way out and re-validation on the
//! way in.
//!
//! The `timestamp`, `base64_bytes` and friends submodules are `#[serde(with)]`
//! helpers for the value encodings shared by all models.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::util::filter_null;

/// A request or response body exchanged with the node.
pub trait Model: Serialize + DeserializeOwned + Sized {
    /// Check invariants the constructors enforce.
    ///
    /// Called after every decode so wire JSON cannot produce a value the
    /// constructors would have rejected.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Encode into a JSON value
    ///
    /// # Arguments
    /// * `hide_null` - Drop object entries whose value is null
    ///
    /// # Returns
    /// * `Result<Value>` - The encoded model
    fn to_json(&self, hide_null: bool) -> Result<Value> {
        let value = serde_json::to_value(self)?;
        Ok(if hide_null { filter_null(value) } else { value })
    }

    /// Encode into JSON text
    fn to_json_string(&self, hide_null: bool) -> Result<String> {
        Ok(serde_json::to_string(&self.to_json(hide_null)?)?)
    }

    /// Decode from a JSON value
    ///
    /// # Returns
    /// * `Err(Il2Error::MissingField)` - A required field is absent
    /// * `Err(Il2Error::InvalidValue)` - A field has the wrong type or an unknown enum value
    ///
    /// # Example
    /// ```no_run
    /// use il2_rest::marshal::Model;
    /// use il2_rest::models::ChainIdModel;
    ///
    /// let chain = ChainIdModel::from_json(serde_json::json!({"id": "abc", "name": "main"}))?;
    /// # Ok::<(), il2_rest::Il2Error>(())
    /// ```
    fn from_json(value: Value) -> Result<Self> {
        let model: Self = serde_json::from_value(value)?;
        model.validate()?;
        Ok(model)
    }

    fn from_json_str(text: &str) -> Result<Self> {
        Self::from_json(serde_json::from_str(text)?)
    }
}

/// Encode any serializable value, hiding nulls when asked.
pub fn to_json<T: Serialize + ?Sized>(value: &T, hide_null: bool) -> Result<Value> {
    let value = serde_json::to_value(value)?;
    Ok(if hide_null { filter_null(value) } else { value })
}

/// Decode a JSON array of models.
pub fn from_json_list<T: Model>(value: Value) -> Result<Vec<T>> {
    match value {
        Value::Array(items) => items.into_iter().map(T::from_json).collect(),
        Value::Null => Ok(Vec::new()),
        other => Err(crate::error::Il2Error::InvalidValue(format!(
            "expected a list but got {}",
            other
        ))),
    }
}

/// `serialize_with` helper writing a secret string in clear text.
pub fn expose_secret<S: serde::Serializer>(
    value: &secrecy::SecretString,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    use secrecy::ExposeSecret;
    serializer.serialize_str(value.expose_secret())
}

/// Timestamps as `2020-02-26T23:17:03.018975-03:00`.
pub mod timestamp {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::util::{format_timestamp, parse_timestamp};

    pub fn serialize<S: Serializer>(
        value: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse_timestamp(&text).map_err(serde::de::Error::custom)
    }
}

pub mod option_timestamp {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::util::{format_timestamp, parse_timestamp};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&format_timestamp(v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => parse_timestamp(&text)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// Byte payloads as standard base64 text, decoded exactly once.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD
            .decode(text.as_bytes())
            .map_err(|e| serde::de::Error::custom(format!("invalid base64: {}", e)))
    }
}

pub mod option_base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => STANDARD
                .decode(text.as_bytes())
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid base64: {}", e))),
            None => Ok(None),
        }
    }
}
