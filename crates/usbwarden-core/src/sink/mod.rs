/// Event delivery — where finished [`CopyEvent`]s are handed off.
///
/// Recording is best-effort: callers log a failed `record` and move on.
/// Nothing in the core retries, blocks, or buffers on a failing sink.
///
/// Two sinks are bundled: [`JsonlSink`] appends events to a JSON-lines log
/// file, and [`ChannelSink`] forwards them over a bounded channel to an
/// in-process consumer (query layer, tests).
use crate::model::CopyEvent;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Why a sink rejected an event.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("event log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("event channel is full")]
    ChannelFull,
    #[error("event channel is disconnected")]
    ChannelClosed,
}

pub trait EventSink: Send + Sync {
    /// Record one event. Failures are the caller's to log; delivery is
    /// best-effort, not guaranteed-durable.
    fn record(&self, event: CopyEvent) -> Result<(), StorageError>;
}

/// Append-only JSON-lines event log.
///
/// One serialized event per line, flushed per record so an abrupt process
/// exit loses at most the event being written.
pub struct JsonlSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    /// Open (or create) the log at `path`, creating parent directories as
    /// needed. Existing content is preserved; events are appended.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl EventSink for JsonlSink {
    fn record(&self, event: CopyEvent) -> Result<(), StorageError> {
        let line = serde_json::to_string(&event)?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Maximum number of undelivered events a [`ChannelSink`] will hold.
///
/// Arrivals are human-paced (one per copy operation), so a backlog this deep
/// means the consumer is gone or wedged; further events are dropped with an
/// error rather than queued without bound.
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Bounded-channel adapter for in-process consumers.
pub struct ChannelSink {
    tx: Sender<CopyEvent>,
}

impl ChannelSink {
    /// Create a sink/receiver pair with [`EVENT_CHANNEL_CAPACITY`] slots.
    pub fn bounded() -> (Self, Receiver<CopyEvent>) {
        let (tx, rx) = crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn record(&self, event: CopyEvent) -> Result<(), StorageError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => StorageError::ChannelFull,
            TrySendError::Disconnected(_) => StorageError::ChannelClosed,
        })
    }
}
