//! Rotating-file sink.
//!
//! Records are serialized to JSON lines and handed over a bounded channel
//! to a single writer on the blocking thread pool, keeping file I/O off the
//! async workers. The writer rotates files by date (daily or hourly) and,
//! when a size limit is configured, pages within a period by appending a
//! numeric index. Intended for ingestion via a log-shipping agent rather
//! than direct HTTP delivery.

use crate::consumer::Consumer;
use crate::error::{IngestError, IngestResult};
use async_trait::async_trait;
use chrono::Local;
use pulse_types::EventRecord;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const DEFAULT_CHANNEL_SIZE: usize = 1000;

/// How often the sink starts a new file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RotateMode {
    Daily,
    Hourly,
}

impl RotateMode {
    fn date_format(self) -> &'static str {
        match self {
            RotateMode::Daily => "%Y-%m-%d",
            RotateMode::Hourly => "%Y-%m-%d-%H",
        }
    }
}

/// Configuration for [`LogConsumer`].
#[derive(Clone, Debug)]
pub struct LogConfig {
    /// Directory holding the log files; created if missing.
    pub directory: PathBuf,
    pub rotate_mode: RotateMode,
    /// Maximum size of a single file in MB. 0 disables size-based paging.
    pub max_file_size_mb: u64,
    /// Optional file-name prefix.
    pub file_name_prefix: String,
    /// Channel capacity between producers and the writer task. 0 = default.
    pub channel_size: usize,
}

impl LogConfig {
    pub fn new(directory: impl Into<PathBuf>, rotate_mode: RotateMode) -> Self {
        Self {
            directory: directory.into(),
            rotate_mode,
            max_file_size_mb: 0,
            file_name_prefix: String::new(),
            channel_size: 0,
        }
    }
}

enum LogCommand {
    Write(Vec<u8>),
    Sync(oneshot::Sender<std::io::Result<()>>),
    Shutdown,
}

/// Appends records as JSON lines to size/time-rotated files.
pub struct LogConsumer {
    tx: mpsc::Sender<LogCommand>,
    writer: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl LogConsumer {
    pub fn new(directory: impl Into<PathBuf>, rotate_mode: RotateMode) -> IngestResult<Self> {
        Self::with_config(LogConfig::new(directory, rotate_mode))
    }

    pub fn with_config(config: LogConfig) -> IngestResult<Self> {
        std::fs::create_dir_all(&config.directory)?;

        let channel_size = if config.channel_size == 0 {
            DEFAULT_CHANNEL_SIZE
        } else {
            config.channel_size
        };
        let (tx, rx) = mpsc::channel(channel_size);

        let mut writer = LogWriter {
            directory: config.directory.clone(),
            date_format: config.rotate_mode.date_format(),
            prefix: config.file_name_prefix,
            max_bytes: config.max_file_size_mb * 1024 * 1024,
            file: None,
            page_index: 0,
            current_date: String::new(),
        };
        writer.open_current()?;

        let handle = tokio::task::spawn_blocking(move || writer.run(rx));

        info!(directory = %config.directory.display(), "log consumer started");

        Ok(Self {
            tx,
            writer: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Consumer for LogConsumer {
    async fn add(&self, record: EventRecord) -> IngestResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IngestError::Closed);
        }
        let line = serde_json::to_vec(&record)?;
        self.tx
            .send(LogCommand::Write(line))
            .await
            .map_err(|_| IngestError::Closed)
    }

    async fn flush(&self) -> IngestResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(IngestError::Closed);
        }
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(LogCommand::Sync(reply_tx))
            .await
            .map_err(|_| IngestError::Closed)?;
        reply_rx.await.map_err(|_| IngestError::Closed)??;
        Ok(())
    }

    async fn close(&self) -> IngestResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(IngestError::Closed);
        }
        // Queued writes are ahead of the shutdown command and drain first.
        let _ = self.tx.send(LogCommand::Shutdown).await;
        if let Some(handle) = self.writer.lock().await.take() {
            if handle.await.is_err() {
                warn!("log writer task panicked");
            }
        }
        info!("log consumer closed");
        Ok(())
    }

    fn is_stringent(&self) -> bool {
        false
    }
}

struct LogWriter {
    directory: PathBuf,
    date_format: &'static str,
    prefix: String,
    max_bytes: u64,
    file: Option<File>,
    page_index: u32,
    current_date: String,
}

impl LogWriter {
    fn run(mut self, mut rx: mpsc::Receiver<LogCommand>) {
        while let Some(command) = rx.blocking_recv() {
            match command {
                LogCommand::Write(line) => {
                    if let Err(e) = self.write_line(&line) {
                        warn!(error = %e, "log write failed");
                    }
                }
                LogCommand::Sync(reply) => {
                    let result = match &self.file {
                        Some(file) => file.sync_all(),
                        None => Ok(()),
                    };
                    let _ = reply.send(result);
                }
                LogCommand::Shutdown => break,
            }
        }
        if let Some(file) = self.file.take() {
            let _ = file.sync_all();
        }
        debug!("log writer stopped");
    }

    fn file_path(&self, date: &str, index: u32) -> PathBuf {
        let prefix = if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}.", self.prefix)
        };
        let name = if self.max_bytes > 0 {
            format!("{prefix}log.{date}_{index}")
        } else {
            format!("{prefix}log.{date}")
        };
        self.directory.join(name)
    }

    fn open_current(&mut self) -> std::io::Result<()> {
        let date = Local::now().format(self.date_format).to_string();
        if date != self.current_date {
            // New rotation period: paging starts over.
            self.page_index = 0;
            self.current_date = date;
        }
        let path = self.file_path(&self.current_date, self.page_index);
        self.file = Some(open_append(&path)?);
        Ok(())
    }

    fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        let date = Local::now().format(self.date_format).to_string();
        let needs_rotation = match &self.file {
            None => true,
            Some(file) => {
                if date != self.current_date {
                    true
                } else if self.max_bytes > 0 && file.metadata()?.len() > self.max_bytes {
                    self.page_index += 1;
                    true
                } else {
                    false
                }
            }
        };

        if needs_rotation {
            if let Some(old) = self.file.take() {
                let _ = old.sync_all();
            }
            self.open_current()?;
        }

        match self.file.as_mut() {
            Some(file) => {
                file.write_all(line)?;
                file.write_all(b"\n")
            }
            None => Err(std::io::Error::other("log file not open")),
        }
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
