//! Property-bag validation helpers.
//!
//! Contract: property keys are 1-50 characters, starting with a letter or
//! `$`, followed by letters, digits, or underscores. Non-finite floats are
//! rejected unconditionally since JSON cannot represent them.

use crate::value::{Properties, PropertyValue};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const KEY_PATTERN: &str = "^[a-zA-Z$][A-Za-z0-9_]{0,49}$";

static KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(KEY_PATTERN).expect("key pattern is valid"));

/// Errors produced by property validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid property key {0:?}: must match {KEY_PATTERN}")]
    InvalidKey(String),

    #[error("property {0:?} is not a finite number")]
    NonFiniteNumber(String),

    #[error("event name must not be empty")]
    EmptyEventName,

    #[error("properties must not be empty for this operation")]
    EmptyProperties,
}

/// Returns true if `key` is an acceptable property-bag key.
pub fn is_valid_key(key: &str) -> bool {
    KEY_REGEX.is_match(key)
}

/// Validates a property bag.
///
/// Non-finite floats fail regardless of `stringent`; they can never
/// serialize to JSON. Key-pattern violations fail only when `stringent` is
/// set; permissive consumers forward whatever keys the caller provides.
pub fn validate_properties(props: &Properties, stringent: bool) -> Result<(), ValidationError> {
    for (key, value) in props {
        if stringent && !is_valid_key(key) {
            return Err(ValidationError::InvalidKey(key.clone()));
        }
        check_finite(key, value)?;
    }
    Ok(())
}

fn check_finite(key: &str, value: &PropertyValue) -> Result<(), ValidationError> {
    match value {
        PropertyValue::Float(f) if !f.is_finite() => {
            Err(ValidationError::NonFiniteNumber(key.to_string()))
        }
        PropertyValue::List(items) => {
            for item in items {
                check_finite(key, item)?;
            }
            Ok(())
        }
        PropertyValue::Map(entries) => {
            for value in entries.values() {
                check_finite(key, value)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}
