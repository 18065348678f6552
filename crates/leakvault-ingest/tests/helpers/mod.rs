//! Shared fixtures for integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, BufReader, ReadBuf};
use tokio::sync::Semaphore;

use leakvault_common::StoredCredential;
use leakvault_ingest::config::{HashConfig, IngestConfig, PipelineConfig};
use leakvault_ingest::error::{IngestError, Result};
use leakvault_ingest::fetch::{LineSource, ObjectFetcher, ObjectLocation};
use leakvault_ingest::hasher::{Argon2Hasher, CredentialHasher};
use leakvault_ingest::sink::{CredentialSink, MemorySink};

/// Weakest parameters Argon2 accepts; keeps the suite fast
pub fn cheap_hash_config() -> HashConfig {
    HashConfig {
        memory_kib: 256,
        iterations: 1,
        parallelism: 1,
    }
}

pub fn cheap_hasher() -> Arc<Argon2Hasher> {
    Arc::new(Argon2Hasher::new(&cheap_hash_config()).unwrap())
}

pub fn pipeline_config(workers: usize, batch_size: usize) -> PipelineConfig {
    PipelineConfig {
        workers,
        batch_size,
        ..Default::default()
    }
}

pub fn test_config(destination: &str, workers: usize, batch_size: usize) -> IngestConfig {
    IngestConfig {
        destination: Some(destination.to_string()),
        pipeline: pipeline_config(workers, batch_size),
        hash: cheap_hash_config(),
        ..Default::default()
    }
}

/// Dump of `count` well-formed `userN@domainM.com:passN` lines
pub fn numbered_dump(count: usize) -> String {
    (0..count)
        .map(|i| format!("user{}@domain{}.com:pass{}\n", i, i % 7, i))
        .collect()
}

/// Hasher that fails for one specific plaintext
pub struct FailingHasher {
    inner: Arc<Argon2Hasher>,
    poison: String,
}

impl FailingHasher {
    pub fn on(poison: &str) -> Self {
        Self {
            inner: cheap_hasher(),
            poison: poison.to_string(),
        }
    }
}

impl CredentialHasher for FailingHasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        if plaintext == self.poison {
            return Err(IngestError::Hash("entropy source unavailable".to_string()));
        }
        self.inner.hash(plaintext)
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool> {
        self.inner.verify(plaintext, hash)
    }
}

/// Reader that yields `data` and then fails every read
pub struct BrokenReader {
    data: Vec<u8>,
    pos: usize,
}

impl BrokenReader {
    pub fn after(data: &[u8]) -> BufReader<Self> {
        BufReader::new(Self {
            data: data.to_vec(),
            pos: 0,
        })
    }
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos >= self.data.len() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        let n = buf.remaining().min(self.data.len() - self.pos);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

/// Reader that hands out at most one line per read and counts them
///
/// Lets a test see how far the dispatcher has pulled into its input.
pub struct LineCountingReader {
    data: Vec<u8>,
    pos: usize,
    served: Arc<AtomicUsize>,
}

impl LineCountingReader {
    pub fn new(data: &[u8]) -> (BufReader<Self>, Arc<AtomicUsize>) {
        let served = Arc::new(AtomicUsize::new(0));
        let reader = Self {
            data: data.to_vec(),
            pos: 0,
            served: Arc::clone(&served),
        };
        (BufReader::new(reader), served)
    }
}

impl AsyncRead for LineCountingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let start = self.pos;
        if start >= self.data.len() {
            return Poll::Ready(Ok(()));
        }
        let line_end = self.data[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.data.len(), |i| start + i + 1);
        let n = buf.remaining().min(line_end - start);
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        if self.pos == line_end {
            self.served.fetch_add(1, Ordering::SeqCst);
        }
        Poll::Ready(Ok(()))
    }
}

/// Memory sink whose writes wait for a permit
///
/// Starts closed: every `put` parks until [`GatedSink::open`] is called.
pub struct GatedSink {
    pub inner: MemorySink,
    gate: Semaphore,
}

impl GatedSink {
    pub fn closed() -> Self {
        Self {
            inner: MemorySink::new(),
            gate: Semaphore::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(1024);
    }
}

#[async_trait]
impl CredentialSink for GatedSink {
    type Item = StoredCredential;

    fn destination(&self) -> &str {
        "gated-memory"
    }

    fn marshal(&self, record: &StoredCredential) -> Result<StoredCredential> {
        self.inner.marshal(record)
    }

    async fn put(&self, item: StoredCredential) -> Result<()> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| IngestError::Persist(e.to_string()))?;
        self.inner.put(item).await
    }
}

/// Serves S3 locations from memory
#[derive(Default)]
pub struct MapFetcher {
    objects: HashMap<String, Vec<u8>>,
}

impl MapFetcher {
    pub fn with(mut self, bucket: &str, key: &str, body: &str) -> Self {
        self.objects
            .insert(format!("{}/{}", bucket, key), body.as_bytes().to_vec());
        self
    }
}

#[async_trait]
impl ObjectFetcher for MapFetcher {
    async fn open(&self, location: &ObjectLocation) -> Result<LineSource> {
        let ObjectLocation::S3 { bucket, key } = location else {
            return Err(IngestError::Fetch(format!("{} is not an S3 location", location)));
        };
        let body = self
            .objects
            .get(&format!("{}/{}", bucket, key))
            .cloned()
            .ok_or_else(|| IngestError::Fetch(format!("NoSuchKey: {}", location)))?;
        Ok(Box::pin(io::Cursor::new(body)))
    }
}
