//! Batching engine configuration.

use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const MAX_BATCH_SIZE: usize = 200;
pub const DEFAULT_CACHE_CAPACITY: usize = 50;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);

/// Configuration for [`BatchConsumer`](crate::BatchConsumer).
///
/// Out-of-range sizes are normalized rather than rejected: a zero batch size
/// falls back to the default, oversized batches clamp to [`MAX_BATCH_SIZE`],
/// a zero cache capacity falls back to the default. Only the endpoint is
/// validated strictly.
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Collection endpoint URL. Required.
    pub endpoint: String,

    /// Records accumulated before a flush is triggered. 0 = default.
    pub batch_size: usize,

    /// Maximum flushed-but-undelivered batches retained. Once exceeded the
    /// oldest batch is dropped. 0 = default.
    pub cache_capacity: usize,

    /// Per-request timeout. Ignored when `http_client` is supplied.
    pub timeout: Duration,

    /// Gzip-compress payloads.
    pub compress: bool,

    /// Spawn the background flush scheduler.
    pub auto_flush: bool,

    /// Tick period of the background scheduler.
    pub flush_interval: Duration,

    /// Externally supplied HTTP client, sharing its connection pool across
    /// engine instances. When set, the caller owns timeout configuration.
    pub http_client: Option<reqwest::Client>,
}

impl BatchConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            timeout: DEFAULT_TIMEOUT,
            compress: true,
            auto_flush: false,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            http_client: None,
        }
    }

    /// Applies the documented normalization rules.
    pub(crate) fn normalized_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            self.batch_size.min(MAX_BATCH_SIZE)
        }
    }

    pub(crate) fn normalized_cache_capacity(&self) -> usize {
        if self.cache_capacity == 0 {
            DEFAULT_CACHE_CAPACITY
        } else {
            self.cache_capacity
        }
    }
}
