//! Storage sinks for hashed credentials
//!
//! A sink exposes exactly one write: `put` a single record. Before writing,
//! the worker asks the sink to `marshal` each record into its own wire
//! representation, so conversion problems surface for the whole batch before
//! anything is written.
//!
//! Implementations must be safe to share between workers (`Send + Sync`); the
//! pipeline holds one `Arc` and never locks around it.

use async_trait::async_trait;

use crate::error::Result;
use leakvault_common::StoredCredential;

pub mod dynamo;
pub mod jsonl;
pub mod memory;

pub use dynamo::DynamoSink;
pub use jsonl::JsonLinesSink;
pub use memory::MemorySink;

/// Single-record storage destination
#[async_trait]
pub trait CredentialSink: Send + Sync {
    /// Wire form accepted by [`CredentialSink::put`]
    type Item: Send + 'static;

    /// Human-readable destination, for logs
    fn destination(&self) -> &str;

    /// Convert a record to the wire form; failure is `IngestError::Marshal`
    fn marshal(&self, record: &StoredCredential) -> Result<Self::Item>;

    /// Write one record; failure is `IngestError::Persist`
    async fn put(&self, item: Self::Item) -> Result<()>;
}
