//! # Key Codec
//!
//! Decodes the request body of the lookup and scan routes into ordered
//! primary-key segments, and resolves those into reader key arguments.
//!
//! Wire format:
//!
//! ```json
//! {"Key": [{"Value": 42}, {"Binary": "3q2+7w=="}]}
//! ```
//!
//! `Value` carries any JSON scalar. `Binary` carries base64 for varbinary
//! columns and wins over `Value` when it decodes to a non-empty payload.
//! Field names match case-insensitively, and anything after the first JSON
//! value in the body is ignored.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::reader::KeyArg;

/// One primary-key segment
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireKey")]
pub enum KeySegment {
    Scalar(Value),
    Binary(Vec<u8>),
}

impl KeySegment {
    /// Build a segment from both wire fields. A non-empty binary payload
    /// takes precedence, then the scalar, then JSON null.
    pub fn new(value: Option<Value>, binary: Option<Vec<u8>>) -> Self {
        match binary {
            Some(bytes) if !bytes.is_empty() => KeySegment::Binary(bytes),
            _ => KeySegment::Scalar(value.unwrap_or(Value::Null)),
        }
    }

    /// The reader-side value for this segment
    pub fn resolve(&self) -> KeyArg {
        match self {
            KeySegment::Scalar(value) => KeyArg::Value(value.clone()),
            KeySegment::Binary(bytes) => KeyArg::Bytes(bytes.clone()),
        }
    }
}

/// Resolve every segment, keeping request order
pub fn to_positional_args(segments: &[KeySegment]) -> Vec<KeyArg> {
    segments.iter().map(KeySegment::resolve).collect()
}

#[derive(Debug, Default, Deserialize)]
struct WireKey {
    #[serde(default, rename = "Value")]
    value: Option<Value>,
    #[serde(default, rename = "Binary")]
    binary: Option<String>,
}

impl TryFrom<WireKey> for KeySegment {
    type Error = base64::DecodeError;

    fn try_from(wire: WireKey) -> Result<Self, Self::Error> {
        let binary = wire.binary.map(|b| STANDARD.decode(b)).transpose()?;
        Ok(KeySegment::new(wire.value, binary))
    }
}

/// Body of the lookup and scan routes
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReadRequest {
    #[serde(default, rename = "Key", deserialize_with = "null_as_empty")]
    pub key: Vec<KeySegment>,
}

impl ReadRequest {
    /// Decode a request body
    pub fn from_slice(body: &[u8]) -> serde_json::Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_slice(body);
        let mut value = Value::deserialize(&mut deserializer)?;

        if value.is_null() {
            return Ok(Self::default());
        }
        let Some(request) = value.as_object_mut() else {
            return Err(serde_json::Error::custom("request body must be a JSON object"));
        };

        canonicalize_fields(request, &["Key"]);
        if let Some(Value::Array(segments)) = request.get_mut("Key") {
            for segment in segments.iter_mut() {
                match segment {
                    Value::Object(fields) => canonicalize_fields(fields, &["Value", "Binary"]),
                    Value::Null => *segment = Value::Object(Map::new()),
                    _ => return Err(serde_json::Error::custom("key segment must be a JSON object")),
                }
            }
        }
        serde_json::from_value(value)
    }

    pub fn positional_args(&self) -> Vec<KeyArg> {
        to_positional_args(&self.key)
    }
}

/// Rename fields that match one of `names` ignoring ASCII case to that name
fn canonicalize_fields(object: &mut Map<String, Value>, names: &[&str]) {
    let renames: Vec<(String, &str)> = object
        .keys()
        .filter_map(|field| {
            names
                .iter()
                .copied()
                .find(|name| field.eq_ignore_ascii_case(name) && field.as_str() != *name)
                .map(|name| (field.clone(), name))
        })
        .collect();

    for (field, name) in renames {
        if let Some(value) = object.remove(&field) {
            object.insert(name.to_string(), value);
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<KeySegment>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<KeySegment>>::deserialize(deserializer)?.unwrap_or_default())
}
