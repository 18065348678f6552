//! Access to dump objects
//!
//! Objects are never buffered whole: fetchers hand back a buffered async
//! reader that the pipeline consumes line by line.

use async_trait::async_trait;
use aws_sdk_s3::{error::DisplayErrorContext, Client};
use std::fmt;
use std::path::PathBuf;
use std::pin::Pin;
use tokio::io::{AsyncBufRead, BufReader};
use tracing::{debug, instrument};

use crate::error::{IngestError, Result};

/// Streaming line source consumed by the pipeline
pub type LineSource = Pin<Box<dyn AsyncBufRead + Send>>;

/// Where a dump lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectLocation {
    S3 { bucket: String, key: String },
    Local(PathBuf),
}

impl ObjectLocation {
    pub fn s3(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::S3 {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 { bucket, key } => write!(f, "s3://{}/{}", bucket, key),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Opens a dump for streaming reads
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn open(&self, location: &ObjectLocation) -> Result<LineSource>;
}

/// Streams objects out of S3
#[derive(Debug, Clone)]
pub struct S3Fetcher {
    client: Client,
}

impl S3Fetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectFetcher for S3Fetcher {
    #[instrument(skip(self, location), fields(location = %location))]
    async fn open(&self, location: &ObjectLocation) -> Result<LineSource> {
        let ObjectLocation::S3 { bucket, key } = location else {
            return Err(IngestError::Fetch(format!(
                "{} is not an S3 location",
                location
            )));
        };

        debug!("Opening stream from s3://{}/{}", bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                IngestError::Fetch(format!(
                    "Failed to get s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!(
            content_length = ?response.content_length(),
            "Object stream opened"
        );

        Ok(Box::pin(response.body.into_async_read()))
    }
}

/// Reads dumps from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFetcher;

#[async_trait]
impl ObjectFetcher for LocalFetcher {
    async fn open(&self, location: &ObjectLocation) -> Result<LineSource> {
        let ObjectLocation::Local(path) = location else {
            return Err(IngestError::Fetch(format!(
                "{} is not a local path",
                location
            )));
        };

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| IngestError::Fetch(format!("Failed to open {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Opened local dump");
        Ok(Box::pin(BufReader::new(file)))
    }
}
