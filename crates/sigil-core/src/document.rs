//! Generic structured documents for assertion payloads
//!
//! Assertion semantics are caller-extensible, so payloads are carried as a
//! tagged generic document rather than a fixed schema. Only the structural
//! envelope is validated here; well-known assertion schemas are enforced by
//! higher layers. Maps use `BTreeMap` so the CBOR wire form is deterministic,
//! which the claim-signing path depends on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use base64::Engine;

use crate::error::{Error, Result};

/// A JSON/CBOR-like document value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocValue {
    /// Absent value
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Signed integer scalar
    Int(i64),
    /// Floating-point scalar
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes; rendered as base64 text when converted to JSON
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Ordered sequence
    Seq(Vec<DocValue>),
    /// Key-ordered mapping
    Map(BTreeMap<String, DocValue>),
}

impl DocValue {
    /// Empty map
    pub fn map() -> Self {
        Self::Map(BTreeMap::new())
    }

    /// Borrow as a map, if this value is one
    pub fn as_map(&self) -> Option<&BTreeMap<String, DocValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as text, if this value is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Map member lookup; `None` for non-maps and absent keys
    pub fn get(&self, key: &str) -> Option<&DocValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Convert a JSON value; lossless for everything JSON can express
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        Ok(match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    return Err(Error::serialization(
                        "document from json",
                        format!("unrepresentable number {n}"),
                    ));
                }
            }
            serde_json::Value::String(s) => Self::Text(s.clone()),
            serde_json::Value::Array(items) => Self::Seq(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_json::Value::Object(fields) => {
                let mut map = BTreeMap::new();
                for (k, v) in fields {
                    map.insert(k.clone(), Self::from_json(v)?);
                }
                Self::Map(map)
            }
        })
    }

    /// Convert to JSON; bytes become base64 text
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Bytes(b) => serde_json::Value::String(
                base64::engine::general_purpose::STANDARD.encode(b),
            ),
            Self::Seq(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
            Self::Map(map) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                serde_json::Value::Object(obj)
            }
        }
    }
}

impl From<&str> for DocValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for DocValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for DocValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for DocValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip_preserves_unknown_keys() {
        let json: serde_json::Value = serde_json::from_str(
            r#"{"use": "notAllowed", "x-vendor-extension": {"depth": 3, "tags": ["a", "b"]}}"#,
        )
        .unwrap();
        let doc = DocValue::from_json(&json).unwrap();
        assert_eq!(doc.to_json(), json);
        assert_eq!(
            doc.get("x-vendor-extension").and_then(|v| v.get("depth")),
            Some(&DocValue::Int(3))
        );
    }

    #[test]
    fn cbor_round_trip() {
        let mut map = BTreeMap::new();
        map.insert("label".to_string(), DocValue::from("c2pa.actions"));
        map.insert("raw".to_string(), DocValue::Bytes(vec![0, 159, 146, 150]));
        map.insert("count".to_string(), DocValue::Int(-2));
        let doc = DocValue::Map(map);
        let wire = serde_cbor::to_vec(&doc).unwrap();
        let back: DocValue = serde_cbor::from_slice(&wire).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn map_ordering_is_deterministic() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"b": 1, "a": 2, "c": 3}"#).unwrap();
        let doc = DocValue::from_json(&a).unwrap();
        let w1 = serde_cbor::to_vec(&doc).unwrap();
        let w2 = serde_cbor::to_vec(&DocValue::from_json(&a).unwrap()).unwrap();
        assert_eq!(w1, w2);
    }
}
