//! Package metadata block.
//!
//! A package carries an ordered string-keyed mapping that always contains
//! the identity fields (`group`, `name`, `version`) plus arbitrary
//! caller-supplied keys. The identity keys are reserved: a caller attempt
//! to overwrite one is dropped with a warning, never an error.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::types::{IdentityError, PackageIdentity};

/// Keys owned by the identity; compared case-insensitively on merge.
const RESERVED_KEYS: [&str; 3] = ["group", "name", "version"];

/// A metadata value: string, list, or nested mapping.
///
/// This is a closed variant mirroring the three runtime value shapes the
/// metadata block supports; serialization is an explicit recursion over
/// the three arms.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataValue {
    Text(String),
    List(Vec<MetadataValue>),
    Map(Vec<(String, MetadataValue)>),
}

impl Serialize for MetadataValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl MetadataValue {
    /// Convert a JSON value into the closed variant.
    ///
    /// Scalars other than strings are rendered through their JSON text form
    /// since the metadata model only has the three shapes.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Self::List(items.iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
            other => Self::Text(other.to_string()),
        }
    }

    /// The string payload, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Insertion-ordered package metadata, seeded with the identity fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageMetadata {
    entries: Vec<(String, MetadataValue)>,
}

impl PackageMetadata {
    /// Build metadata seeded from a package identity.
    ///
    /// `group` is omitted when the identity has none.
    pub fn for_identity(identity: &PackageIdentity) -> Self {
        let mut entries = Vec::new();
        if let Some(group) = identity.group() {
            entries.push(("group".to_string(), MetadataValue::from(group)));
        }
        entries.push(("name".to_string(), MetadataValue::from(identity.name())));
        entries.push((
            "version".to_string(),
            MetadataValue::from(identity.version().to_string()),
        ));
        Self { entries }
    }

    /// Merge caller-supplied entries, preserving insertion order.
    ///
    /// Keys case-insensitively equal to a reserved identity key are dropped
    /// with a warning. Non-reserved duplicate keys replace the earlier value
    /// in place.
    pub fn merge_extra<I>(&mut self, extra: I)
    where
        I: IntoIterator<Item = (String, MetadataValue)>,
    {
        for (key, value) in extra {
            if RESERVED_KEYS
                .iter()
                .any(|reserved| key.eq_ignore_ascii_case(reserved))
            {
                warn!("ignoring reserved metadata key '{key}'");
                continue;
            }
            if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
                slot.1 = value;
            } else {
                self.entries.push((key, value));
            }
        }
    }

    /// Look up a value by exact key.
    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[(String, MetadataValue)] {
        &self.entries
    }

    /// Reconstruct the identity from the reserved keys.
    pub fn identity(&self) -> Result<PackageIdentity, IdentityError> {
        let group = self.get("group").and_then(MetadataValue::as_text);
        let name = self
            .get("name")
            .and_then(MetadataValue::as_text)
            .ok_or(IdentityError::EmptyName)?;
        let version = self
            .get("version")
            .and_then(MetadataValue::as_text)
            .unwrap_or("");
        PackageIdentity::new(group, name, version)
    }

    /// Parse a metadata block from its JSON text form.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        let entries = match &value {
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), MetadataValue::from_json(v)))
                .collect(),
            _ => Vec::new(),
        };
        Ok(Self { entries })
    }
}

impl Serialize for PackageMetadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
