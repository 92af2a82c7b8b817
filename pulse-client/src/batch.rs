//! The batching buffer engine.
//!
//! Records accumulate in an active buffer; a flush promotes the whole buffer
//! into a bounded FIFO of pending batches and attempts delivery of the oldest
//! one. Under sustained endpoint unavailability the cache fills to capacity
//! and the oldest batches are dropped. Bounded, monotonic loss is the
//! intended behavior under those conditions, not a hidden failure mode.
//!
//! Two locks guard engine state: the buffer lock covers active-buffer
//! appends; the coarser delivery lock serializes the entire flush procedure
//! (cache mutation plus the delivery attempt). Lock order is always delivery
//! before buffer.

use crate::config::BatchConfig;
use crate::consumer::Consumer;
use crate::error::{IngestError, IngestResult};
use crate::transport::{EventSender, SendOutcome, parse_endpoint};
use async_trait::async_trait;
use pulse_types::EventRecord;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const MAX_ATTEMPTS: u32 = 3;

/// Buffers records and delivers them in batches over HTTP.
///
/// `add` may perform network I/O before returning: once a batch is full or
/// there is backlog in the delivery cache, every add attempts to drain it,
/// exerting natural backpressure on producers when the endpoint is slow.
#[derive(Debug)]
pub struct BatchConsumer {
    inner: Arc<Engine>,
    scheduler: Mutex<Option<Scheduler>>,
}

/// Background flush scheduler handle; the task is joined on close.
#[derive(Debug)]
struct Scheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
struct Engine {
    sender: EventSender,
    batch_size: usize,
    cache_capacity: usize,
    /// Active accumulation buffer.
    buffer: Mutex<Vec<EventRecord>>,
    /// Flushed-but-undelivered batches, oldest first. This mutex doubles as
    /// the delivery lock: at most one delivery attempt proceeds at a time.
    cache: Mutex<VecDeque<Vec<EventRecord>>>,
    /// Mirror of the cache length, maintained under the delivery lock, so
    /// `add` can test for backlog without queueing behind an in-flight
    /// delivery.
    cache_len: AtomicUsize,
    closed: AtomicBool,
}

impl BatchConsumer {
    /// Creates a batch consumer with default settings (compression on, no
    /// background scheduler).
    pub fn new(endpoint: impl Into<String>) -> IngestResult<Self> {
        Self::with_config(BatchConfig::new(endpoint))
    }

    pub fn with_config(config: BatchConfig) -> IngestResult<Self> {
        let endpoint = parse_endpoint(&config.endpoint)?;
        let client = match config.http_client.clone() {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .map_err(|e| IngestError::Config(format!("failed to build HTTP client: {e}")))?,
        };

        let batch_size = config.normalized_batch_size();
        let cache_capacity = config.normalized_cache_capacity();

        let inner = Arc::new(Engine {
            sender: EventSender::new(client, endpoint, config.compress),
            batch_size,
            cache_capacity,
            buffer: Mutex::new(Vec::with_capacity(batch_size)),
            cache: Mutex::new(VecDeque::with_capacity(cache_capacity)),
            cache_len: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });

        let scheduler = if config.auto_flush {
            Some(spawn_scheduler(Arc::clone(&inner), config.flush_interval))
        } else {
            None
        };

        info!(
            endpoint = %config.endpoint,
            batch_size,
            cache_capacity,
            auto_flush = config.auto_flush,
            "batch consumer started"
        );

        Ok(Self {
            inner,
            scheduler: Mutex::new(scheduler),
        })
    }

    /// Effective batch size after normalization.
    pub fn batch_size(&self) -> usize {
        self.inner.batch_size
    }

    /// Effective cache capacity after normalization.
    pub fn cache_capacity(&self) -> usize {
        self.inner.cache_capacity
    }

    /// Number of records in the active buffer.
    pub async fn buffered(&self) -> usize {
        self.inner.buffer.lock().await.len()
    }

    /// Number of flushed batches awaiting delivery.
    pub fn cached(&self) -> usize {
        self.inner.cache_len.load(Ordering::SeqCst)
    }

    /// Repeatedly flushes until both the buffer and the cache are empty.
    ///
    /// Transport errors are tolerated while each iteration still shrinks the
    /// backlog (capacity eviction counts as progress); an iteration that
    /// makes no progress propagates the error, as does any non-transport
    /// failure.
    pub async fn flush_all(&self) -> IngestResult<()> {
        self.inner.flush_all().await
    }
}

#[async_trait]
impl Consumer for BatchConsumer {
    async fn add(&self, record: EventRecord) -> IngestResult<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(IngestError::Closed);
        }

        let buffered = {
            let mut buffer = self.inner.buffer.lock().await;
            buffer.push(record);
            buffer.len()
        };

        if buffered >= self.inner.batch_size || self.cached() > 0 {
            return self.inner.flush().await;
        }
        Ok(())
    }

    async fn flush(&self) -> IngestResult<()> {
        debug!("explicit flush");
        self.inner.flush().await
    }

    async fn close(&self) -> IngestResult<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(scheduler) = self.scheduler.lock().await.take() {
            let _ = scheduler.shutdown.send(true);
            if scheduler.handle.await.is_err() {
                warn!("flush scheduler task panicked");
            }
        }

        info!("batch consumer closing, draining pending batches");
        self.inner.flush_all().await
    }

    fn is_stringent(&self) -> bool {
        false
    }
}

fn spawn_scheduler(engine: Arc<Engine>, period: Duration) -> Scheduler {
    let (shutdown, mut rx) = watch::channel(false);
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // Skip the immediate first tick.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("periodic flush");
                    if let Err(e) = engine.flush().await {
                        warn!(error = %e, "periodic flush failed");
                    }
                }
                _ = rx.changed() => break,
            }
        }
        debug!("flush scheduler stopped");
    });
    Scheduler { shutdown, handle }
}

impl Engine {
    /// The internal flush procedure. Holds the delivery lock, then the
    /// buffer lock, for its full duration; a producer-triggered flush and a
    /// scheduler tick can never interleave.
    async fn flush(&self) -> IngestResult<()> {
        let mut cache = self.cache.lock().await;
        let mut buffer = self.buffer.lock().await;

        if buffer.is_empty() && cache.is_empty() {
            return Ok(());
        }

        // Promote the active buffer as one new batch, unless the cache
        // already holds backlog and the buffer is still below batch size;
        // small adds then keep accumulating instead of flooding the cache.
        if cache.is_empty() || buffer.len() >= self.batch_size {
            let batch = std::mem::replace(&mut *buffer, Vec::with_capacity(self.batch_size));
            if !batch.is_empty() {
                cache.push_back(batch);
            }
        }

        let result = self.deliver_oldest(&mut cache).await;

        // Capacity is enforced regardless of the delivery outcome.
        if cache.len() > self.cache_capacity {
            cache.pop_front();
            warn!(
                capacity = self.cache_capacity,
                "delivery cache over capacity, dropping oldest batch"
            );
        }
        self.cache_len.store(cache.len(), Ordering::SeqCst);

        result
    }

    /// Delivers the oldest pending batch, one request per client id.
    ///
    /// The batch is evicted only once every client group has been accepted;
    /// on failure it stays at the head of the cache for a later flush. The
    /// one exception is a record that cannot serialize: it can never
    /// succeed, so that client's records are dropped from the head batch
    /// and the error surfaced, leaving sibling groups queued.
    async fn deliver_oldest(
        &self,
        cache: &mut VecDeque<Vec<EventRecord>>,
    ) -> IngestResult<()> {
        let Some(batch) = cache.front() else {
            return Ok(());
        };

        for group in group_by_client(batch) {
            let count = group.event_count();
            match self.send_with_retry(&group, count).await {
                Ok(()) => {}
                Err(e @ IngestError::Serialization(_)) => {
                    error!(client_id = %group.client_id, "dropping unserializable records");
                    drop_client_from_head(cache, &group.client_id);
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        cache.pop_front();
        Ok(())
    }

    async fn send_with_retry(&self, record: &EventRecord, count: usize) -> IngestResult<()> {
        let mut last_status = reqwest::StatusCode::OK;
        for attempt in 1..=MAX_ATTEMPTS {
            // A transport-level error aborts immediately; the batch stays
            // queued for the next flush.
            match self.sender.send(record, count).await? {
                SendOutcome::Accepted => {
                    debug!(client_id = %record.client_id, events = count, "batch delivered");
                    return Ok(());
                }
                SendOutcome::Rejected(code) => {
                    error!(code, "server rejected payload");
                    return Err(IngestError::Rejected { code });
                }
                SendOutcome::Status(status) => {
                    warn!(%status, attempt, "delivery attempt failed");
                    last_status = status;
                }
            }
        }
        Err(IngestError::RetriesExhausted {
            attempts: MAX_ATTEMPTS,
            status: last_status,
        })
    }

    async fn flush_all(&self) -> IngestResult<()> {
        loop {
            let backlog = self.backlog().await;
            if backlog == 0 {
                return Ok(());
            }
            match self.flush().await {
                Ok(()) => {}
                Err(e) if e.is_transport() => {
                    if self.backlog().await >= backlog {
                        return Err(e);
                    }
                    warn!(error = %e, "transport error while draining, continuing");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn backlog(&self) -> usize {
        self.buffer.lock().await.len() + self.cache_len.load(Ordering::SeqCst)
    }
}

/// Removes one client's records from the head batch, dropping the batch
/// entirely when nothing else remains.
fn drop_client_from_head(cache: &mut VecDeque<Vec<EventRecord>>, client_id: &str) {
    if let Some(head) = cache.front_mut() {
        head.retain(|r| r.client_id != client_id);
        if head.is_empty() {
            cache.pop_front();
        }
    }
}

/// Merges a batch into one record per client id, preserving each client's
/// sub-event order by concatenation in encounter order.
fn group_by_client(batch: &[EventRecord]) -> Vec<EventRecord> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<EventRecord> = Vec::new();
    for record in batch {
        match index.get(&record.client_id) {
            Some(&i) => groups[i]
                .event_list
                .extend(record.event_list.iter().cloned()),
            None => {
                index.insert(record.client_id.clone(), groups.len());
                groups.push(record.clone());
            }
        }
    }
    groups
}
