//! Insert worker
//!
//! Workers share one queue receiver and take one batch at a time. A batch is
//! parsed and hashed on the blocking pool, marshalled as a whole, then written
//! record by record in line order.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::Batch;
use crate::error::{IngestError, Result};
use crate::hasher::CredentialHasher;
use crate::parser::CredentialParser;
use crate::sink::CredentialSink;
use leakvault_common::StoredCredential;

/// Receiving end of the batch queue, shared by every worker
pub(crate) type SharedQueue = Arc<Mutex<mpsc::Receiver<Batch>>>;

/// What one worker did over the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WorkerStats {
    pub batches: u64,
    pub failed_batches: u64,
    pub records_written: u64,
}

impl WorkerStats {
    pub fn merge(&mut self, other: WorkerStats) {
        self.batches += other.batches;
        self.failed_batches += other.failed_batches;
        self.records_written += other.records_written;
    }
}

enum BatchOutcome {
    Written(usize),
    Failed { written: usize },
}

pub(crate) struct InsertWorker<S: CredentialSink> {
    worker_id: usize,
    parser: Arc<CredentialParser>,
    hasher: Arc<dyn CredentialHasher>,
    sink: Arc<S>,
    queue: SharedQueue,
    cancel: CancellationToken,
}

impl<S: CredentialSink + 'static> InsertWorker<S> {
    pub fn new(
        worker_id: usize,
        parser: Arc<CredentialParser>,
        hasher: Arc<dyn CredentialHasher>,
        sink: Arc<S>,
        queue: SharedQueue,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            worker_id,
            parser,
            hasher,
            sink,
            queue,
            cancel,
        }
    }

    /// Drain batches until the queue closes or the run is cancelled
    ///
    /// A hash failure (or a panicked blocking task) ends the worker with an
    /// error and cancels the run on the way out.
    pub async fn run(self) -> Result<WorkerStats> {
        let mut stats = WorkerStats::default();
        debug!(worker_id = self.worker_id, "Worker started");

        while let Some(batch) = self.next_batch().await {
            let sequence = batch.sequence;
            let lines = batch.lines.len();

            match self.process(batch).await {
                Ok(BatchOutcome::Written(written)) => {
                    stats.batches += 1;
                    stats.records_written += written as u64;
                    info!(
                        worker_id = self.worker_id,
                        batch = sequence,
                        records = written,
                        "Successfully inserted {} records",
                        written
                    );
                },
                Ok(BatchOutcome::Failed { written }) => {
                    stats.batches += 1;
                    stats.failed_batches += 1;
                    stats.records_written += written as u64;
                },
                Err(e) => {
                    error!(
                        worker_id = self.worker_id,
                        batch = sequence,
                        lines,
                        error = %e,
                        "Batch aborted, cancelling run"
                    );
                    self.cancel.cancel();
                    return Err(e);
                },
            }
        }

        debug!(worker_id = self.worker_id, batches = stats.batches, "Worker finished");
        Ok(stats)
    }

    async fn next_batch(&self) -> Option<Batch> {
        let mut queue = self.queue.lock().await;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            batch = queue.recv() => batch,
        }
    }

    async fn process(&self, batch: Batch) -> Result<BatchOutcome> {
        let sequence = batch.sequence;

        let parser = Arc::clone(&self.parser);
        let hasher = Arc::clone(&self.hasher);
        let records =
            tokio::task::spawn_blocking(move || hash_batch(&parser, &*hasher, batch))
                .await??;

        let items = match records
            .iter()
            .map(|record| self.sink.marshal(record))
            .collect::<Result<Vec<_>>>()
        {
            Ok(items) => items,
            Err(e) => {
                warn!(
                    worker_id = self.worker_id,
                    batch = sequence,
                    records = records.len(),
                    error = %e,
                    "Batch not written: marshalling failed"
                );
                return Ok(BatchOutcome::Failed { written: 0 });
            },
        };

        let mut written = 0;
        for (record, item) in records.iter().zip(items) {
            if let Err(e) = self.sink.put(item).await {
                warn!(
                    worker_id = self.worker_id,
                    batch = sequence,
                    records = records.len(),
                    written,
                    error = %e,
                    "Batch failed during insert"
                );
                debug!(
                    worker_id = self.worker_id,
                    batch = sequence,
                    record_id = %record.id,
                    email = %record.email,
                    "Rejected record"
                );
                return Ok(BatchOutcome::Failed { written });
            }
            written += 1;
        }

        Ok(BatchOutcome::Written(written))
    }
}

/// Parse and hash every line of a batch; runs on the blocking pool
///
/// Stops at the first hash failure so nothing of the batch reaches the sink.
fn hash_batch(
    parser: &CredentialParser,
    hasher: &dyn CredentialHasher,
    batch: Batch,
) -> Result<Vec<StoredCredential>> {
    batch
        .lines
        .iter()
        .map(|line| {
            let parsed = parser.parse(line);
            let hash = hasher.hash(&parsed.password).map_err(|e| match e {
                IngestError::Hash(_) => e,
                other => IngestError::Hash(other.to_string()),
            })?;
            Ok(parsed.into_stored(hash))
        })
        .collect()
}
