//! The consumer capability interface.
//!
//! Everything downstream of the [`Analytics`](crate::Analytics) facade
//! (the batching engine, the synchronous debug sender, the rotating file
//! sink) implements this trait, so callers pick a delivery strategy at
//! construction and the rest of the API is identical.

use crate::error::IngestResult;
use async_trait::async_trait;
use pulse_types::EventRecord;

/// A sink for event records.
#[async_trait]
pub trait Consumer: Send + Sync {
    /// Submits one record. Depending on the implementation this may buffer,
    /// write to disk, or perform network I/O before returning.
    async fn add(&self, record: EventRecord) -> IngestResult<()>;

    /// Forces buffered data toward its destination.
    async fn flush(&self) -> IngestResult<()>;

    /// Drains pending data and releases resources. Further `add` calls are
    /// a usage error.
    async fn close(&self) -> IngestResult<()>;

    /// True if this consumer strictly validates event shape (property key
    /// patterns) before accepting records; false for permissive best-effort
    /// sinks.
    fn is_stringent(&self) -> bool;
}
