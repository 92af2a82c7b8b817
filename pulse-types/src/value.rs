//! The property-value variant type.
//!
//! Property bags are loosely typed on the wire (JSON objects with
//! heterogeneous values, including nested arrays and objects). Rather than
//! exposing raw `serde_json::Value`, the SDK models the accepted shapes as an
//! explicit variant so timestamps get a defined serialization and everything
//! else stays strongly typed at the API boundary.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Rendering used for [`PropertyValue::Timestamp`] on the wire.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A property bag attached to a sub-event.
pub type Properties = HashMap<String, PropertyValue>;

/// One value in a property bag.
///
/// Serializes untagged: `Bool`/`Int`/`Float`/`String` as the plain JSON
/// scalar, `Timestamp` as a formatted date string, `List` and `Map` as JSON
/// arrays and objects of nested values.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    List(Vec<PropertyValue>),
    Map(HashMap<String, PropertyValue>),
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropertyValue::Bool(b) => serializer.serialize_bool(*b),
            PropertyValue::Int(i) => serializer.serialize_i64(*i),
            PropertyValue::Float(f) => serializer.serialize_f64(*f),
            PropertyValue::String(s) => serializer.serialize_str(s),
            PropertyValue::Timestamp(t) => {
                serializer.collect_str(&t.format(TIMESTAMP_FORMAT))
            }
            PropertyValue::List(items) => items.serialize(serializer),
            PropertyValue::Map(entries) => entries.serialize(serializer),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v as i64)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<u32> for PropertyValue {
    fn from(v: u32) -> Self {
        PropertyValue::Int(v as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::String(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::String(v)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(v: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(v)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(v: Vec<T>) -> Self {
        PropertyValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PropertyValue>> From<HashMap<String, T>> for PropertyValue {
    fn from(v: HashMap<String, T>) -> Self {
        PropertyValue::Map(v.into_iter().map(|(k, val)| (k, val.into())).collect())
    }
}
