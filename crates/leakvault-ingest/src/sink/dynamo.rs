//! DynamoDB sink: one `PutItem` per credential
//!
//! Lookups go through the `EmailIndex` and `DomainIndex` secondary indexes;
//! a lookup without filters is a single bounded `Scan`.

use async_trait::async_trait;
use aws_sdk_dynamodb::{error::DisplayErrorContext, types::AttributeValue, Client};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

use super::CredentialSink;
use crate::aws::AwsConfig;
use crate::error::{IngestError, Result};
use crate::lookup::{CredentialLookup, LookupQuery, DOMAIN_INDEX, EMAIL_INDEX};
use leakvault_common::StoredCredential;

/// Attribute map sent with `PutItem`
pub type DynamoItem = HashMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub struct DynamoSink {
    client: Client,
    table_name: String,
}

impl DynamoSink {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub async fn from_config(aws: &AwsConfig, table_name: impl Into<String>) -> Self {
        let sink = Self::new(aws.dynamodb_client().await, table_name);
        info!(table = %sink.table_name, "DynamoDB sink initialized");
        sink
    }

    /// Every item whose `attribute` equals `value`, following pagination
    async fn query_index(&self, index: &str, attribute: &str, value: &str) -> Result<Vec<DynamoItem>> {
        let mut items = Vec::new();
        let mut start_key: Option<DynamoItem> = None;

        loop {
            let response = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(index)
                .key_condition_expression("#k = :v")
                .expression_attribute_names("#k", attribute)
                .expression_attribute_values(":v", AttributeValue::S(value.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    IngestError::Lookup(format!(
                        "Query on {} ({}) failed: {}",
                        self.table_name,
                        index,
                        DisplayErrorContext(&e)
                    ))
                })?;

            items.extend(response.items().iter().cloned());
            debug!(index, fetched = items.len(), "Query page received");

            match response.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn scan(&self, limit: usize) -> Result<Vec<DynamoItem>> {
        let response = self
            .client
            .scan()
            .table_name(&self.table_name)
            .limit(i32::try_from(limit).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|e| {
                IngestError::Lookup(format!(
                    "Scan of {} failed: {}",
                    self.table_name,
                    DisplayErrorContext(&e)
                ))
            })?;

        Ok(response.items().iter().take(limit).cloned().collect())
    }
}

#[async_trait]
impl CredentialLookup for DynamoSink {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find(&self, query: &LookupQuery) -> Result<Vec<StoredCredential>> {
        let items = match query {
            LookupQuery::Email(email) => self.query_index(EMAIL_INDEX, "email", email).await?,
            LookupQuery::Domain(domain) => self.query_index(DOMAIN_INDEX, "domain", domain).await?,
            LookupQuery::Scan { limit } => self.scan(*limit).await?,
        };
        items.into_iter().map(from_item).collect()
    }
}

#[async_trait]
impl CredentialSink for DynamoSink {
    type Item = DynamoItem;

    fn destination(&self) -> &str {
        &self.table_name
    }

    fn marshal(&self, record: &StoredCredential) -> Result<DynamoItem> {
        to_item(record)
    }

    async fn put(&self, item: DynamoItem) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|e| {
                IngestError::Persist(format!(
                    "PutItem into {} failed: {}",
                    self.table_name,
                    DisplayErrorContext(&e)
                ))
            })?;

        debug!(table = %self.table_name, "Item written");
        Ok(())
    }
}

/// Marshal a record into string attributes
///
/// Every field of a stored credential is textual; anything else means the
/// record shape changed without the table mapping following.
pub fn to_item(record: &StoredCredential) -> Result<DynamoItem> {
    let value = serde_json::to_value(record)
        .map_err(|e| IngestError::Marshal(format!("failed to marshal credential: {}", e)))?;

    let Value::Object(fields) = value else {
        return Err(IngestError::Marshal(
            "credential did not serialize to an object".to_string(),
        ));
    };

    fields
        .into_iter()
        .map(|(name, value)| match value {
            Value::String(s) => Ok((name, AttributeValue::S(s))),
            other => Err(IngestError::Marshal(format!(
                "attribute '{}' is not a string: {}",
                name, other
            ))),
        })
        .collect()
}

/// Rebuild a record from string attributes
pub fn from_item(item: DynamoItem) -> Result<StoredCredential> {
    let fields = item
        .into_iter()
        .map(|(name, value)| match value {
            AttributeValue::S(s) => Ok((name, Value::String(s))),
            other => Err(IngestError::Marshal(format!(
                "attribute '{}' is not a string: {:?}",
                name, other
            ))),
        })
        .collect::<Result<serde_json::Map<String, Value>>>()?;

    serde_json::from_value(Value::Object(fields))
        .map_err(|e| IngestError::Marshal(format!("failed to unmarshal credential: {}", e)))
}
