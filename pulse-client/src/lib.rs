//! Buffered HTTP delivery of telemetry events.
//!
//! Three interchangeable [`Consumer`] implementations sit behind the
//! [`Analytics`] facade:
//! - [`BatchConsumer`]: the production path, with bounded two-stage
//!   buffering, gzip-compressed batch delivery with retry, and an optional
//!   background flush scheduler
//! - [`DebugConsumer`]: unbuffered one-event-at-a-time delivery for
//!   integration bring-up
//! - [`LogConsumer`]: rotating-file sink for log-shipping pipelines
//!
//! Delivery is at-least-once with bounded retry; under sustained endpoint
//! unavailability the oldest undelivered batches are dropped once the
//! delivery cache exceeds capacity.

pub mod analytics;
pub mod batch;
pub mod config;
pub mod consumer;
pub mod debug;
pub mod error;
pub mod log;
pub mod transport;

pub use analytics::Analytics;
pub use batch::BatchConsumer;
pub use config::BatchConfig;
pub use consumer::Consumer;
pub use debug::DebugConsumer;
pub use error::{IngestError, IngestResult};
pub use log::{LogConfig, LogConsumer, RotateMode};
