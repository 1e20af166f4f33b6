//! Fire-and-forget traffic log sink.
//!
//! [`LogSink`] decouples per-message logging from message handling. Records
//! go into a bounded queue with `try_send`; a small pool of dedicated OS
//! threads drains the queue and emits each record through `tracing`. When
//! the queue is full the record is dropped and counted instead of applying
//! back-pressure to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::Level;

const TRAFFIC_TARGET: &str = "pubsub_gateway::traffic";

/// Severity of a [`LogRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Verbose diagnostics.
    Debug,
    /// Normal traffic.
    Info,
    /// Recoverable per-message failure.
    Warn,
    /// Unexpected failure with detail for operators.
    Error,
}

/// One queued log entry.
#[derive(Debug, Clone)]
pub struct LogRecord {
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Optional failure detail (error chain, panic payload).
    pub detail: Option<String>,
}

/// Cloneable handle to the log worker pool.
///
/// Workers exit once every handle has been dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct LogSink {
    tx: mpsc::Sender<LogRecord>,
    dropped: Arc<AtomicU64>,
}

impl LogSink {
    /// Starts `workers` log threads sharing a queue of `capacity` records.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a worker thread cannot be spawned.
    pub fn start(workers: usize, capacity: usize) -> std::io::Result<Self> {
        let (sink, rx) = Self::queue(capacity);
        let rx = Arc::new(Mutex::new(rx));
        for index in 0..workers.max(1) {
            let rx = Arc::clone(&rx);
            thread::Builder::new()
                .name(format!("log-worker-{index}"))
                .spawn(move || worker_loop(&rx))?;
        }
        Ok(sink)
    }

    /// A sink without workers; the caller drains the receiver.
    pub(crate) fn queue(capacity: usize) -> (Self, mpsc::Receiver<LogRecord>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    /// Queues a record without waiting. Never blocks the caller.
    pub fn emit(&self, level: LogLevel, message: impl Into<String>, detail: Option<String>) {
        let record = LogRecord {
            level,
            message: message.into(),
            detail,
        };
        if self.tx.try_send(record).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Shorthand for an [`LogLevel::Info`] record.
    pub fn info(&self, message: impl Into<String>) {
        self.emit(LogLevel::Info, message, None);
    }

    /// Shorthand for a [`LogLevel::Debug`] record.
    pub fn debug(&self, message: impl Into<String>) {
        self.emit(LogLevel::Debug, message, None);
    }

    /// Returns `true` if records at `level` would be written by the current
    /// subscriber. Lets callers skip building expensive messages.
    #[must_use]
    pub fn enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Debug => tracing::enabled!(target: TRAFFIC_TARGET, Level::DEBUG),
            LogLevel::Info => tracing::enabled!(target: TRAFFIC_TARGET, Level::INFO),
            LogLevel::Warn => tracing::enabled!(target: TRAFFIC_TARGET, Level::WARN),
            LogLevel::Error => tracing::enabled!(target: TRAFFIC_TARGET, Level::ERROR),
        }
    }

    /// Number of records discarded because the queue was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of free slots in the queue.
    #[must_use]
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }
}

fn worker_loop(rx: &Mutex<mpsc::Receiver<LogRecord>>) {
    loop {
        let record = {
            let mut guard = rx.lock().unwrap_or_else(PoisonError::into_inner);
            guard.blocking_recv()
        };
        let Some(record) = record else {
            break;
        };
        write_record(&record);
    }
}

fn write_record(record: &LogRecord) {
    let detail = record.detail.as_deref();
    let message = &record.message;
    match record.level {
        LogLevel::Debug => {
            tracing::debug!(target: TRAFFIC_TARGET, detail, "message: {message}");
        }
        LogLevel::Info => {
            tracing::info!(target: TRAFFIC_TARGET, detail, "message: {message}");
        }
        LogLevel::Warn => {
            tracing::warn!(target: TRAFFIC_TARGET, detail, "message: {message}");
        }
        LogLevel::Error => {
            tracing::error!(target: TRAFFIC_TARGET, detail, "message: {message}");
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (sink, mut rx) = LogSink::queue(2);
        for i in 0..5 {
            sink.info(format!("record {i}"));
        }
        assert_eq!(sink.dropped(), 3);

        let Ok(first) = rx.try_recv() else {
            panic!("expected a queued record");
        };
        assert_eq!(first.level, LogLevel::Info);
        assert_eq!(first.message, "record 0");
    }

    #[test]
    fn enabled_follows_subscriber_level() {
        let (sink, _rx) = LogSink::queue(1);
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            assert!(sink.enabled(LogLevel::Info));
            assert!(sink.enabled(LogLevel::Error));
            assert!(!sink.enabled(LogLevel::Debug));
        });
    }

    #[test]
    fn records_are_drained() {
        let Ok(sink) = LogSink::start(2, 64) else {
            panic!("failed to start log sink");
        };
        sink.emit(LogLevel::Error, "boom", Some("detail".to_string()));
        sink.debug("quiet");
        for _ in 0..200 {
            if sink.available() == 64 {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(sink.available(), 64);
        assert_eq!(sink.dropped(), 0);
    }
}
