//! HTTP delivery of serialized event records.
//!
//! Stateless aside from the shared connection pool: serializes one record,
//! optionally gzip-compresses it, POSTs with identifying headers, and
//! classifies the response. Retry policy lives in the batching engine.

use crate::error::{IngestError, IngestResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use pulse_types::{EventRecord, LIB_NAME, SDK_VERSION};
use reqwest::{Client, StatusCode, Url, header};
use serde::Deserialize;
use std::io::Write;
use tracing::debug;

/// Header carrying the payload encoding (`gzip` or `none`).
pub const HEADER_COMPRESS: &str = "Pulse-Content-Compress";
/// Integration identification headers.
pub const HEADER_INTEGRATION_TYPE: &str = "Pulse-Integration-Type";
pub const HEADER_INTEGRATION_VERSION: &str = "Pulse-Integration-Version";
pub const HEADER_INTEGRATION_COUNT: &str = "Pulse-Integration-Count";

const USER_AGENT: &str = "pulse-rust-sdk";

/// Classified result of one delivery attempt.
#[derive(Debug)]
pub(crate) enum SendOutcome {
    /// HTTP 200 with `code == 0`.
    Accepted,
    /// HTTP 200 with a non-zero application code; unrecoverable rejection.
    Rejected(i64),
    /// Any non-200 status with no transport error; retryable.
    Status(StatusCode),
}

/// Response body contract of the collection endpoint: `code == 0` means
/// accepted, anything else an application-level rejection.
#[derive(Deserialize)]
pub(crate) struct ServerReply {
    pub(crate) code: i64,
}

/// Sends serialized records to the collection endpoint.
#[derive(Debug)]
pub(crate) struct EventSender {
    client: Client,
    endpoint: Url,
    compress: bool,
}

impl EventSender {
    pub(crate) fn new(client: Client, endpoint: Url, compress: bool) -> Self {
        Self {
            client,
            endpoint,
            compress,
        }
    }

    /// Delivers one record carrying `event_count` sub-events.
    ///
    /// Transport failures (connect, DNS, timeout, body decode) surface as
    /// `IngestError::Http`; everything that produced an HTTP status is
    /// classified into a [`SendOutcome`].
    pub(crate) async fn send(
        &self,
        record: &EventRecord,
        event_count: usize,
    ) -> IngestResult<SendOutcome> {
        let payload = serde_json::to_vec(record)?;
        let (body, encoding) = if self.compress {
            (gzip(&payload)?, "gzip")
        } else {
            (payload, "none")
        };

        let resp = self
            .client
            .post(self.endpoint.clone())
            .header(header::USER_AGENT, USER_AGENT)
            .header("version", SDK_VERSION)
            .header(HEADER_COMPRESS, encoding)
            .header(HEADER_INTEGRATION_TYPE, LIB_NAME)
            .header(HEADER_INTEGRATION_VERSION, SDK_VERSION)
            .header(HEADER_INTEGRATION_COUNT, event_count.to_string())
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Ok(SendOutcome::Status(status));
        }

        let reply: ServerReply = resp.json().await?;
        debug!(code = reply.code, "collection endpoint replied");
        if reply.code == 0 {
            Ok(SendOutcome::Accepted)
        } else {
            Ok(SendOutcome::Rejected(reply.code))
        }
    }
}

fn gzip(data: &[u8]) -> IngestResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Parses and sanity-checks an endpoint URL at construction time.
pub(crate) fn parse_endpoint(endpoint: &str) -> IngestResult<Url> {
    if endpoint.is_empty() {
        return Err(IngestError::Config("endpoint must not be empty".into()));
    }
    Url::parse(endpoint)
        .map_err(|e| IngestError::Config(format!("invalid endpoint {endpoint:?}: {e}")))
}
