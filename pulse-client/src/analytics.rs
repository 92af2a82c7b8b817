//! The public tracking facade.
//!
//! Wraps any [`Consumer`] and exposes the event vocabulary: `track` for
//! ordinary events plus the profile-mutation operations. The facade stamps
//! timestamps, injects the `$lib`/`$lib_version` properties, and validates
//! property bags before handing records to the consumer.

use crate::consumer::Consumer;
use crate::error::IngestResult;
use chrono::{DateTime, Utc};
use pulse_types::{
    EventKind, EventRecord, LIB_NAME, Properties, SDK_VERSION, SubEvent, ValidationError,
    profile_op, validate_properties,
};
use std::sync::Arc;
use tracing::info;

/// Entry point for reporting events.
#[derive(Clone)]
pub struct Analytics {
    consumer: Arc<dyn Consumer>,
}

impl Analytics {
    pub fn new(consumer: impl Consumer + 'static) -> Self {
        Self::from_arc(Arc::new(consumer))
    }

    pub fn from_arc(consumer: Arc<dyn Consumer>) -> Self {
        info!("analytics client initialized");
        Self { consumer }
    }

    /// Reports an ordinary event, stamped with the current time.
    pub async fn track(
        &self,
        client_id: &str,
        event_name: &str,
        properties: Properties,
    ) -> IngestResult<()> {
        self.track_inner(client_id, event_name, Utc::now().timestamp_millis(), false, properties)
            .await
    }

    /// Reports an ordinary event with a caller-supplied timestamp.
    pub async fn track_at(
        &self,
        client_id: &str,
        event_name: &str,
        time: DateTime<Utc>,
        properties: Properties,
    ) -> IngestResult<()> {
        self.track_inner(client_id, event_name, time.timestamp_millis(), true, properties)
            .await
    }

    async fn track_inner(
        &self,
        client_id: &str,
        event_name: &str,
        time: i64,
        time_free: bool,
        mut properties: Properties,
    ) -> IngestResult<()> {
        if event_name.is_empty() {
            return Err(ValidationError::EmptyEventName.into());
        }
        // A caller-supplied integration identity is preserved.
        properties
            .entry("$lib".into())
            .or_insert_with(|| LIB_NAME.into());
        properties
            .entry("$lib_version".into())
            .or_insert_with(|| SDK_VERSION.into());
        self.submit(client_id, EventKind::Track, event_name, time, time_free, properties)
            .await
    }

    /// Sets user properties, overwriting existing values.
    pub async fn user_set(&self, client_id: &str, properties: Properties) -> IngestResult<()> {
        self.profile(client_id, profile_op::SET, properties).await
    }

    /// Sets user properties only where no value exists yet.
    pub async fn user_set_once(&self, client_id: &str, properties: Properties) -> IngestResult<()> {
        self.profile(client_id, profile_op::SET_ONCE, properties)
            .await
    }

    /// Clears the named user properties.
    pub async fn user_unset(&self, client_id: &str, properties: Properties) -> IngestResult<()> {
        if properties.is_empty() {
            return Err(ValidationError::EmptyProperties.into());
        }
        self.profile(client_id, profile_op::UNSET, properties).await
    }

    /// Accumulates onto numeric user properties.
    pub async fn user_increment(&self, client_id: &str, properties: Properties) -> IngestResult<()> {
        self.profile(client_id, profile_op::INCREMENT, properties)
            .await
    }

    /// Keeps the maximum of the stored and supplied numeric values.
    pub async fn user_num_max(&self, client_id: &str, properties: Properties) -> IngestResult<()> {
        self.profile(client_id, profile_op::NUM_MAX, properties)
            .await
    }

    /// Keeps the minimum of the stored and supplied numeric values.
    pub async fn user_num_min(&self, client_id: &str, properties: Properties) -> IngestResult<()> {
        self.profile(client_id, profile_op::NUM_MIN, properties)
            .await
    }

    /// Appends to list-valued user properties.
    pub async fn user_append(&self, client_id: &str, properties: Properties) -> IngestResult<()> {
        self.profile(client_id, profile_op::APPEND, properties).await
    }

    /// Appends to list-valued user properties, deduplicating.
    pub async fn user_uniq_append(
        &self,
        client_id: &str,
        properties: Properties,
    ) -> IngestResult<()> {
        self.profile(client_id, profile_op::UNIQ_APPEND, properties)
            .await
    }

    /// Deletes the user. Cannot be undone.
    pub async fn user_delete(&self, client_id: &str) -> IngestResult<()> {
        self.profile(client_id, profile_op::DELETE, Properties::new())
            .await
    }

    async fn profile(
        &self,
        client_id: &str,
        operation: &str,
        properties: Properties,
    ) -> IngestResult<()> {
        self.submit(
            client_id,
            EventKind::Profile,
            operation,
            Utc::now().timestamp_millis(),
            false,
            properties,
        )
        .await
    }

    async fn submit(
        &self,
        client_id: &str,
        kind: EventKind,
        name: &str,
        time: i64,
        time_free: bool,
        properties: Properties,
    ) -> IngestResult<()> {
        validate_properties(&properties, self.consumer.is_stringent())?;
        let event = SubEvent {
            kind,
            name: name.to_string(),
            time,
            time_free,
            properties,
        };
        self.consumer.add(EventRecord::single(client_id, event)).await
    }

    /// Forces buffered data toward its destination.
    pub async fn flush(&self) -> IngestResult<()> {
        self.consumer.flush().await
    }

    /// Drains pending data and shuts the consumer down.
    pub async fn close(&self) -> IngestResult<()> {
        let result = self.consumer.close().await;
        info!("analytics client closed");
        result
    }
}
