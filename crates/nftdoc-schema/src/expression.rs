use ipnet::IpNet;
use serde::de::{self, Deserializer};
use serde::ser::{self, SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::{Map, Value, json};
use std::fmt;

/// Message carried by the decode error raised for expressions that are
/// neither a string, a number, a boolean nor an object.
pub const UNSUPPORTED_EXPRESSION: &str = "unsupported field type in expression";

/// Largest magnitude for which an integral float is written as an integer.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A verbatim JSON fragment.
///
/// Always holds syntactically valid JSON and is written back byte-for-byte,
/// so shapes the model does not know survive a decode/encode cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawJson(String);

impl RawJson {
    /// Validates `json` and keeps it as-is (no re-formatting).
    pub fn parse(json: impl Into<String>) -> serde_json::Result<Self> {
        let json = json.into();
        serde_json::from_str::<de::IgnoredAny>(&json)?;
        Ok(Self(json.trim().to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.0)
    }
}

impl From<Value> for RawJson {
    fn from(value: Value) -> Self {
        Self(value.to_string())
    }
}

impl From<Box<RawValue>> for RawJson {
    fn from(raw: Box<RawValue>) -> Self {
        Self(raw.get().to_owned())
    }
}

impl fmt::Display for RawJson {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RawJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = RawValue::from_string(self.0.clone()).map_err(ser::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Box::<RawValue>::deserialize(deserializer).map(Self::from)
    }
}

/// Header field reference, e.g. `ip saddr`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Payload {
    pub protocol: String,
    pub field: String,
}

/// Operand of a match statement (and of NAT address/port).
///
/// Numbers read from JSON always land in `Float`: the wire format does not
/// distinguish integers from floats. Any object other than a plain
/// `{"payload":{"protocol":..,"field":..}}` is kept as `Raw`.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    String(String),
    Integer(i64),
    Boolean(bool),
    Float(f64),
    Payload(Payload),
    Raw(RawJson),
}

impl Expression {
    pub fn payload(protocol: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Payload(Payload {
            protocol: protocol.into(),
            field: field.into(),
        })
    }

    /// `{"meta":{"key":..}}`, e.g. `iifname`, `l4proto`.
    pub fn meta(key: &str) -> Self {
        Self::Raw(json!({"meta": {"key": key}}).into())
    }

    /// `{"ct":{"key":..}}`, e.g. `state`.
    pub fn ct(key: &str) -> Self {
        Self::Raw(json!({"ct": {"key": key}}).into())
    }

    /// `{"prefix":{"addr":..,"len":..}}` for a CIDR.
    pub fn prefix(net: &IpNet) -> Self {
        Self::Raw(
            json!({"prefix": {"addr": net.addr().to_string(), "len": net.prefix_len()}}).into(),
        )
    }

    /// Wraps arbitrary JSON; fails only if `json` is not valid JSON.
    pub fn raw(json: impl Into<String>) -> serde_json::Result<Self> {
        RawJson::parse(json).map(Self::Raw)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<&str> for Expression {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Expression {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u16> for Expression {
    fn from(value: u16) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Payload> for Expression {
    fn from(value: Payload) -> Self {
        Self::Payload(value)
    }
}

impl Serialize for Expression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Raw(raw) => raw.serialize(serializer),
            Self::String(s) => serializer.serialize_str(s),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Boolean(b) => serializer.serialize_bool(*b),
            Self::Float(f) => serialize_number(*f, serializer),
            Self::Payload(payload) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("payload", payload)?;
                map.end()
            }
        }
    }
}

// 12345.0 goes out as `12345`, the way nft itself prints numbers.
fn serialize_number<S: Serializer>(value: f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER {
        serializer.serialize_i64(value as i64)
    } else {
        serializer.serialize_f64(value)
    }
}

impl<'de> Deserialize<'de> for Expression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let value: Value = serde_json::from_str(raw.get()).map_err(de::Error::custom)?;

        match value {
            Value::String(s) => Ok(Self::String(s)),
            Value::Bool(b) => Ok(Self::Boolean(b)),
            Value::Number(n) => n
                .as_f64()
                .map(Self::Float)
                .ok_or_else(|| de::Error::custom(UNSUPPORTED_EXPRESSION)),
            Value::Object(object) => Ok(match payload_of(&object) {
                Some(payload) => Self::Payload(payload),
                None => Self::Raw(raw.into()),
            }),
            Value::Array(_) | Value::Null => Err(de::Error::custom(UNSUPPORTED_EXPRESSION)),
        }
    }
}

fn payload_of(object: &Map<String, Value>) -> Option<Payload> {
    if object.len() != 1 {
        return None;
    }
    object
        .get("payload")
        .and_then(|inner| Payload::deserialize(inner).ok())
}
