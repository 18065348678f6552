//! JSON-lines file sink, for local runs and handing results to other tools

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::info;

use super::CredentialSink;
use crate::error::{IngestError, Result};
use crate::lookup::{CredentialLookup, LookupQuery};
use leakvault_common::StoredCredential;

/// Appends one JSON object per credential
///
/// Writes from all workers go through one mutex-guarded handle; each `put`
/// writes and flushes a complete line under the lock, so lines never
/// interleave and a failed write is reported by the `put` that caused it.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    display: String,
    file: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Open (or create) `path` in append mode
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                IngestError::Configuration(format!(
                    "Cannot create output directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| {
                IngestError::Configuration(format!("Cannot open {}: {}", path.display(), e))
            })?;

        info!(path = %path.display(), "JSON-lines sink opened");

        Ok(Self {
            display: path.display().to_string(),
            path,
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sync written lines to disk
    pub async fn flush(&self) -> Result<()> {
        let mut file = self.file.lock().await;
        file.flush()
            .await
            .map_err(|e| IngestError::Persist(format!("flush of {} failed: {}", self.display, e)))?;
        file.get_ref()
            .sync_data()
            .await
            .map_err(|e| IngestError::Persist(format!("sync of {} failed: {}", self.display, e)))
    }
}

#[async_trait]
impl CredentialSink for JsonLinesSink {
    type Item = String;

    fn destination(&self) -> &str {
        &self.display
    }

    fn marshal(&self, record: &StoredCredential) -> Result<String> {
        let mut line = serde_json::to_string(record)
            .map_err(|e| IngestError::Marshal(format!("failed to marshal credential: {}", e)))?;
        line.push('\n');
        Ok(line)
    }

    async fn put(&self, item: String) -> Result<()> {
        let mut file = self.file.lock().await;
        file.write_all(item.as_bytes())
            .await
            .map_err(|e| IngestError::Persist(format!("write to {} failed: {}", self.display, e)))?;
        file.flush()
            .await
            .map_err(|e| IngestError::Persist(format!("write to {} failed: {}", self.display, e)))
    }
}

#[async_trait]
impl CredentialLookup for JsonLinesSink {
    /// Reads the whole file; meant for local result files, not large stores
    async fn find(&self, query: &LookupQuery) -> Result<Vec<StoredCredential>> {
        // Writers are locked out until the read completes
        let _file = self.file.lock().await;
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| IngestError::Lookup(format!("read of {} failed: {}", self.display, e)))?;

        let records = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str::<StoredCredential>(line).map_err(|e| {
                    IngestError::Marshal(format!("{} line {}: {}", self.display, i + 1, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(query.select(records))
    }
}
