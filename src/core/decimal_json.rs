//! Decimal-exact JSON codec.
//!
//! Records are stored as JSON with every decimal written as a string, so
//! values never pass through a binary float. [`decode`] walks a parsed JSON
//! tree and turns numbers and numeric strings into [`Decimal`]s, [`encode`]
//! walks back and writes each decimal in its canonical string form.
//!
//! # Numeric-string coercion
//!
//! Decoding attempts a decimal parse on *every* string, so `"0042"` becomes
//! `42` and is written back as `"42"`. Record schemas must not carry
//! decimal-shaped strings that are meant to stay textual.

use rust_decimal::Decimal;
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// A JSON tree whose numbers are exact decimals.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Decimal(Decimal),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a list or a mapping at the top level, found {0}")]
    UnexpectedShape(&'static str),
}

/// Parses `text` as an exact decimal, accepting plain and scientific notation.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Converts a JSON tree into a decimal-aware [`Value`].
pub fn decode(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => decode_number(&n),
        serde_json::Value::String(s) => match parse_decimal(&s) {
            Some(d) => Value::Decimal(d),
            None => Value::String(s),
        },
        serde_json::Value::Array(items) => Value::Array(items.into_iter().map(decode).collect()),
        serde_json::Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, decode(v))).collect())
        }
    }
}

// The textual form of a parsed number is its shortest round-trip
// representation, which is the closest decimal to what the file said.
fn decode_number(n: &serde_json::Number) -> Value {
    let text = n.to_string();
    if let Some(d) = parse_decimal(&text) {
        return Value::Decimal(d);
    }
    match n.as_f64().and_then(Decimal::from_f64_retain) {
        Some(d) => Value::Decimal(d),
        None => Value::String(text),
    }
}

/// Converts a [`Value`] back into a JSON tree, writing decimals as strings.
pub fn encode(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Decimal(d) => serde_json::Value::String(d.to_string()),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(encode).collect()),
        Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), encode(v))).collect(),
        ),
    }
}

fn normalize(json: serde_json::Value) -> serde_json::Value {
    encode(&decode(json))
}

/// Deserializes a typed record from JSON text, passing it through the codec
/// first so that numeric fields arrive as exact decimal strings.
pub fn from_str<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    Ok(serde_json::from_value(normalize(json))?)
}

/// Reads a file holding either a single record or a list of records.
pub fn records_from_str<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, CodecError> {
    let json: serde_json::Value = serde_json::from_str(text)?;
    match normalize(json) {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(CodecError::from))
            .collect(),
        obj @ serde_json::Value::Object(_) => Ok(vec![serde_json::from_value(obj)?]),
        serde_json::Value::Null => Err(CodecError::UnexpectedShape("null")),
        serde_json::Value::Bool(_) => Err(CodecError::UnexpectedShape("a boolean")),
        serde_json::Value::Number(_) => Err(CodecError::UnexpectedShape("a number")),
        serde_json::Value::String(_) => Err(CodecError::UnexpectedShape("a string")),
    }
}

/// Serializes a record with sorted keys and two-space indentation.
pub fn to_string_pretty<T: Serialize>(record: &T) -> Result<String, CodecError> {
    let json = normalize(serde_json::to_value(record)?);
    Ok(serde_json::to_string_pretty(&json)?)
}
