//! In-memory sink for tests and dry runs

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::CredentialSink;
use crate::error::{IngestError, Result};
use crate::lookup::{CredentialLookup, LookupQuery};
use leakvault_common::StoredCredential;

/// Collects every record it is given
///
/// Can be told to reject particular emails at `put` or at `marshal` time,
/// which makes batch failure handling observable without a network.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<StoredCredential>>,
    put_calls: AtomicUsize,
    reject_put: Option<String>,
    reject_marshal: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// `put` fails with `Persist` for records carrying this email
    pub fn failing_put_on(mut self, email: impl Into<String>) -> Self {
        self.reject_put = Some(email.into());
        self
    }

    /// `marshal` fails with `Marshal` for records carrying this email
    pub fn failing_marshal_on(mut self, email: impl Into<String>) -> Self {
        self.reject_marshal = Some(email.into());
        self
    }

    /// Snapshot of everything persisted so far
    pub fn records(&self) -> Vec<StoredCredential> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Number of `put` attempts, successful or not
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CredentialSink for MemorySink {
    type Item = StoredCredential;

    fn destination(&self) -> &str {
        "memory"
    }

    fn marshal(&self, record: &StoredCredential) -> Result<StoredCredential> {
        if self.reject_marshal.as_deref() == Some(record.email.as_str()) {
            return Err(IngestError::Marshal(format!(
                "record {} rejected by memory sink",
                record.id
            )));
        }
        Ok(record.clone())
    }

    async fn put(&self, item: StoredCredential) -> Result<()> {
        self.put_calls.fetch_add(1, Ordering::Relaxed);

        if self.reject_put.as_deref() == Some(item.email.as_str()) {
            return Err(IngestError::Persist(format!(
                "write of {} rejected by memory sink",
                item.id
            )));
        }

        self.records
            .lock()
            .map_err(|_| IngestError::Persist("memory sink poisoned".to_string()))?
            .push(item);
        Ok(())
    }
}

#[async_trait]
impl CredentialLookup for MemorySink {
    async fn find(&self, query: &LookupQuery) -> Result<Vec<StoredCredential>> {
        Ok(query.select(self.records()))
    }
}
