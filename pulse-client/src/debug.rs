//! One-event-at-a-time synchronous sender.
//!
//! Every `add` delivers immediately and reports the outcome to the caller,
//! which makes it useful while wiring up an integration: nothing is
//! buffered, nothing is retried, and malformed events fail loudly.

use crate::consumer::Consumer;
use crate::error::{IngestError, IngestResult};
use crate::transport::{ServerReply, parse_endpoint};
use async_trait::async_trait;
use pulse_types::EventRecord;
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info};

/// Unbuffered consumer that POSTs each record as it arrives.
#[derive(Debug)]
pub struct DebugConsumer {
    client: Client,
    endpoint: Url,
}

impl DebugConsumer {
    pub fn new(endpoint: impl Into<String>) -> IngestResult<Self> {
        let endpoint = parse_endpoint(&endpoint.into())?;
        info!(%endpoint, "debug consumer started");
        Ok(Self {
            client: Client::new(),
            endpoint,
        })
    }
}

#[async_trait]
impl Consumer for DebugConsumer {
    async fn add(&self, record: EventRecord) -> IngestResult<()> {
        debug!(client_id = %record.client_id, events = record.event_count(), "sending record");

        let resp = self
            .client
            .post(self.endpoint.clone())
            .json(&record)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(IngestError::UnexpectedStatus(status));
        }

        let reply: ServerReply = resp.json().await?;
        if reply.code != 0 {
            return Err(IngestError::Rejected { code: reply.code });
        }
        debug!("record accepted");
        Ok(())
    }

    async fn flush(&self) -> IngestResult<()> {
        Ok(())
    }

    async fn close(&self) -> IngestResult<()> {
        info!("debug consumer closed");
        Ok(())
    }

    fn is_stringent(&self) -> bool {
        true
    }
}
