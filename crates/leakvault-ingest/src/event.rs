//! S3 event notifications
//!
//! Only the fields needed to locate uploaded objects are modelled; everything
//! else in the notification is ignored.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{IngestError, Result};
use crate::fetch::ObjectLocation;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3EventRecord {
    #[serde(rename = "eventName", default, skip_serializing_if = "Option::is_none")]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Object {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl S3Event {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| IngestError::Fetch(format!("Invalid S3 event: {}", e)))
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            IngestError::Fetch(format!("Failed to read event {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Objects named by the event, in record order
    pub fn locations(&self) -> impl Iterator<Item = ObjectLocation> + '_ {
        self.records
            .iter()
            .map(|record| ObjectLocation::s3(&record.s3.bucket.name, &record.s3.object.key))
    }
}
