use std::collections::BTreeMap;
use std::iter::FromIterator;

use musr_core::errors::MusrError;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered = map
                .into_iter()
                .map(|(key, value)| (key, canonicalize(value)))
                .collect::<BTreeMap<_, _>>();
            Value::Object(Map::from_iter(ordered))
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Serializes a value into canonical JSON bytes with deterministic key ordering.
pub fn to_canonical_json_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, MusrError> {
    let value = serde_json::to_value(value).map_err(|err| MusrError::serde("json_serialize", err))?;
    let mut bytes = Vec::new();
    serde_json::to_writer(&mut bytes, &canonicalize(value))
        .map_err(|err| MusrError::serde("json_write", err))?;
    Ok(bytes)
}

/// Serializes a value into indented JSON.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, MusrError> {
    serde_json::to_string_pretty(value).map_err(|err| MusrError::serde("json_serialize", err))
}

/// Deserializes a value from JSON bytes.
pub fn from_json_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, MusrError> {
    serde_json::from_slice(data).map_err(|err| MusrError::serde("json_deserialize", err))
}

/// Serializes a value into YAML.
pub fn to_yaml_string<T: Serialize>(value: &T) -> Result<String, MusrError> {
    serde_yaml::to_string(value).map_err(|err| MusrError::serde("yaml_serialize", err))
}

/// Deserializes a YAML payload into the requested type.
pub fn from_yaml_slice<T: DeserializeOwned>(data: &[u8]) -> Result<T, MusrError> {
    serde_yaml::from_slice(data).map_err(|err| MusrError::serde("yaml_deserialize", err))
}
