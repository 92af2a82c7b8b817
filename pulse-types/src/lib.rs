//! Shared data types for the Pulse event-ingestion SDK.
//!
//! An [`EventRecord`] is one client's bundle of sub-events submitted together;
//! each [`SubEvent`] carries a kind (track or profile), a name, an epoch-
//! millisecond timestamp, and a free-form [`Properties`] bag. These types are
//! pure data; batching, delivery, and validation policy live in
//! `pulse-client`.

mod validate;
mod value;

pub use validate::{ValidationError, is_valid_key, validate_properties};
pub use value::{Properties, PropertyValue};

use serde::Serialize;

/// SDK version reported in wire headers and `$lib_version`.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Integration name reported in wire headers and `$lib`.
pub const LIB_NAME: &str = "rust";

/// Profile operation names accepted by the collection endpoint.
pub mod profile_op {
    pub const SET: &str = "profile_set";
    pub const SET_ONCE: &str = "profile_set_once";
    pub const UNSET: &str = "profile_unset";
    pub const INCREMENT: &str = "profile_increment";
    pub const NUM_MAX: &str = "profile_number_max";
    pub const NUM_MIN: &str = "profile_number_min";
    pub const APPEND: &str = "profile_append";
    pub const UNIQ_APPEND: &str = "profile_uniq_append";
    pub const DELETE: &str = "profile_delete";
}

/// Discriminates ordinary tracked events from profile mutations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Track,
    Profile,
}

/// One named, timestamped event with its property bag.
///
/// Wire field names follow the collection endpoint's contract:
/// `type`, `event`, `time`, `time_free`, `properties`.
#[derive(Clone, Debug, Serialize)]
pub struct SubEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(rename = "event")]
    pub name: String,
    /// Milliseconds since the Unix epoch.
    pub time: i64,
    /// True when the timestamp was supplied by the caller rather than
    /// stamped at submission.
    pub time_free: bool,
    pub properties: Properties,
}

/// One client's bundle of sub-events, the unit handed to a consumer.
#[derive(Clone, Debug, Serialize)]
pub struct EventRecord {
    pub client_id: String,
    pub event_list: Vec<SubEvent>,
}

impl EventRecord {
    /// Builds a record carrying a single sub-event.
    pub fn single(client_id: impl Into<String>, event: SubEvent) -> Self {
        Self {
            client_id: client_id.into(),
            event_list: vec![event],
        }
    }

    /// Total sub-event count across the record.
    pub fn event_count(&self) -> usize {
        self.event_list.len()
    }
}
