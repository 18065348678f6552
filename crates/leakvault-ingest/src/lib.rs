//! leakvault ingest library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Turns leaked-credential dumps into privacy-preserving records: each line is
//! parsed into identity fields, the password is replaced by an Argon2id hash,
//! and the result is written to a storage sink.
//!
//! # Components
//!
//! - **parser**: heuristic line parser, never fails
//! - **hasher**: salted one-way password hashing
//! - **pipeline**: batch dispatcher and bounded worker pool
//! - **sink**: DynamoDB, JSON-lines and in-memory destinations
//! - **fetch**: streaming object access (S3, local files)
//! - **job**: wires fetcher, pipeline and sink; handles S3 event notifications
//! - **lookup**: read path by email, domain or bounded scan
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use leakvault_ingest::config::IngestConfig;
//! use leakvault_ingest::fetch::{LocalFetcher, ObjectLocation};
//! use leakvault_ingest::job::IngestJob;
//! use leakvault_ingest::sink::JsonLinesSink;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::load()?;
//!     let sink = Arc::new(JsonLinesSink::open(config.destination()?).await?);
//!     let job = IngestJob::new(&config, Arc::new(LocalFetcher), sink)?;
//!     job.ingest(&ObjectLocation::Local("./dumps/combo.txt".into())).await?;
//!     Ok(())
//! }
//! ```

pub mod aws;
pub mod config;
pub mod error;
pub mod event;
pub mod fetch;
pub mod hasher;
pub mod job;
pub mod lookup;
pub mod parser;
pub mod pipeline;
pub mod sink;

pub use error::{IngestError, Result};
