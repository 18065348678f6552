//! Batch dispatcher and worker pool
//!
//! The dispatcher reads a line source forward-only, cuts it into batches of
//! `batch_size` lines and pushes them onto a queue of depth `workers`. A full
//! queue suspends the reader, which is the only backpressure in the system.
//! At most `workers` batches are queued and `workers` are in flight, so memory
//! stays bounded regardless of input size.
//!
//! Batch-level failures (marshalling, sink writes) are logged by the worker
//! and the run continues. A hash failure cancels the run. A read failure, or a
//! line longer than `max_line_bytes`, stops production; the lines already read
//! are still dispatched and drained before the run fails.

mod worker;

use futures::future::join_all;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::PipelineConfig;
use crate::error::{IngestError, Result};
use crate::hasher::CredentialHasher;
use crate::parser::CredentialParser;
use crate::sink::CredentialSink;
use worker::{InsertWorker, WorkerStats};

/// Up to `batch_size` consecutive lines, in input order
#[derive(Debug)]
pub struct Batch {
    pub sequence: u64,
    pub lines: Vec<Zeroizing<String>>,
}

/// Accumulates lines into fixed-size batches
#[derive(Debug)]
pub struct Batcher {
    batch_size: usize,
    next_sequence: u64,
    pending: Vec<Zeroizing<String>>,
}

impl Batcher {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            next_sequence: 0,
            pending: Vec::with_capacity(batch_size),
        }
    }

    /// Add a line; returns the batch once it is full
    pub fn push(&mut self, line: Zeroizing<String>) -> Option<Batch> {
        self.pending.push(line);
        if self.pending.len() >= self.batch_size {
            Some(self.take())
        } else {
            None
        }
    }

    /// Flush the trailing partial batch, if any
    pub fn finish(mut self) -> Option<Batch> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Batch {
        let lines = std::mem::replace(&mut self.pending, Vec::with_capacity(self.batch_size));
        let batch = Batch {
            sequence: self.next_sequence,
            lines,
        };
        self.next_sequence += 1;
        batch
    }
}

#[derive(Debug, Default)]
struct ProducerStats {
    lines: u64,
    batches: u64,
}

/// Dispatcher owning the worker pool configuration and collaborators
pub struct IngestPipeline<S: CredentialSink> {
    config: PipelineConfig,
    parser: Arc<CredentialParser>,
    hasher: Arc<dyn CredentialHasher>,
    sink: Arc<S>,
}

impl<S: CredentialSink + 'static> IngestPipeline<S> {
    pub fn new(
        config: PipelineConfig,
        parser: CredentialParser,
        hasher: Arc<dyn CredentialHasher>,
        sink: Arc<S>,
    ) -> Self {
        Self {
            config,
            parser: Arc::new(parser),
            hasher,
            sink,
        }
    }

    pub fn config(&self) -> PipelineConfig {
        self.config
    }

    /// Process every line of `reader` and wait for all workers to drain
    pub async fn run<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send,
    {
        self.config.validate()?;
        let PipelineConfig {
            workers,
            batch_size,
            max_line_bytes,
        } = self.config;

        let (tx, rx) = mpsc::channel::<Batch>(workers);
        let queue = Arc::new(Mutex::new(rx));
        let cancel = CancellationToken::new();

        info!(
            workers,
            batch_size,
            max_line_bytes,
            destination = self.sink.destination(),
            "Starting ingest run"
        );

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let worker = InsertWorker::new(
                    worker_id,
                    Arc::clone(&self.parser),
                    Arc::clone(&self.hasher),
                    Arc::clone(&self.sink),
                    Arc::clone(&queue),
                    cancel.clone(),
                );
                tokio::spawn(worker.run())
            })
            .collect();
        // Workers hold the only receivers; if they all exit, sends fail fast
        drop(queue);

        let (produced, read_result) = produce(reader, tx, self.config, &cancel).await;

        let mut totals = WorkerStats::default();
        let mut worker_error = None;
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(stats)) => totals.merge(stats),
                Ok(Err(e)) => {
                    worker_error.get_or_insert(e);
                },
                Err(e) => {
                    worker_error.get_or_insert(IngestError::from(e));
                },
            }
        }

        info!(
            lines = produced.lines,
            batches = produced.batches,
            processed_batches = totals.batches,
            failed_batches = totals.failed_batches,
            records = totals.records_written,
            read_failed = read_result.is_err(),
            destination = self.sink.destination(),
            "Ingest run finished"
        );

        if let Some(e) = worker_error {
            return Err(e);
        }
        read_result
    }
}

/// Read lines into batches and hand them to the queue
///
/// Dropping `tx` on return closes the queue. A cancelled run stops sending
/// without an error; the cancelling worker reports the cause. When the input
/// fails (I/O error or a line over `max_line_bytes`) the lines read so far are
/// still flushed, then the failure is returned next to the counters.
async fn produce<R>(
    mut reader: R,
    tx: mpsc::Sender<Batch>,
    config: PipelineConfig,
    cancel: &CancellationToken,
) -> (ProducerStats, Result<()>)
where
    R: AsyncBufRead + Unpin + Send,
{
    let mut stats = ProducerStats::default();
    let mut batcher = Batcher::new(config.batch_size);
    let mut buf = Zeroizing::new(Vec::new());
    // One byte over the cap tells an overlong line from one that fits exactly
    let read_limit = config.max_line_bytes as u64 + 1;

    let outcome = loop {
        if cancel.is_cancelled() {
            debug!(lines = stats.lines, "Run cancelled, producer stopping");
            return (stats, Ok(()));
        }

        buf.clear();
        let read = match (&mut reader)
            .take(read_limit)
            .read_until(b'\n', &mut *buf)
            .await
        {
            Ok(read) => read,
            Err(e) => {
                warn!(lines = stats.lines, error = %e, "Input stream failed");
                break Err(IngestError::Fetch(format!(
                    "read failed after {} lines: {}",
                    stats.lines, e
                )));
            },
        };
        if read == 0 {
            break Ok(());
        }
        if read as u64 == read_limit && buf.last() != Some(&b'\n') {
            warn!(
                line = stats.lines + 1,
                max_line_bytes = config.max_line_bytes,
                "Line exceeds maximum length"
            );
            break Err(IngestError::Fetch(format!(
                "line {} exceeds {} bytes",
                stats.lines + 1,
                config.max_line_bytes
            )));
        }

        stats.lines += 1;
        if let Some(batch) = batcher.push(decode_line(&buf)) {
            if !dispatch(&tx, batch, cancel).await {
                return (stats, Ok(()));
            }
            stats.batches += 1;
        }
    };

    if let Some(batch) = batcher.finish() {
        if dispatch(&tx, batch, cancel).await {
            stats.batches += 1;
        }
    }

    debug!(lines = stats.lines, batches = stats.batches, "Input exhausted");
    (stats, outcome)
}

/// Send a batch, giving up if the run is cancelled or every worker is gone
async fn dispatch(tx: &mpsc::Sender<Batch>, batch: Batch, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(batch) => sent.is_ok(),
    }
}

/// Strip the line terminator and decode, replacing invalid UTF-8
fn decode_line(raw: &[u8]) -> Zeroizing<String> {
    let raw = raw.strip_suffix(b"\n").unwrap_or(raw);
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    Zeroizing::new(String::from_utf8_lossy(raw).into_owned())
}
