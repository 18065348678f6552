//! Read path over stored credentials
//!
//! A lookup selects records by exact email, by exact domain, or takes a
//! bounded scan of the store. Email wins over domain when both are given;
//! the limit only bounds the scan, index lookups return every match.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{IngestError, Result};
use leakvault_common::StoredCredential;

/// Records returned by a scan when no limit is given.
pub const DEFAULT_LOOKUP_LIMIT: usize = 10;

/// Secondary index keyed on `email`.
pub const EMAIL_INDEX: &str = "EmailIndex";

/// Secondary index keyed on `domain`.
pub const DOMAIN_INDEX: &str = "DomainIndex";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupQuery {
    Email(String),
    Domain(String),
    Scan { limit: usize },
}

impl LookupQuery {
    /// Pick the query from optional filters
    ///
    /// Empty strings count as absent. `limit` must be positive even when an
    /// index lookup ignores it.
    pub fn new(email: Option<String>, domain: Option<String>, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(IngestError::Configuration(
                "lookup limit must be greater than 0".to_string(),
            ));
        }

        let query = match (
            email.filter(|e| !e.is_empty()),
            domain.filter(|d| !d.is_empty()),
        ) {
            (Some(email), _) => Self::Email(email),
            (None, Some(domain)) => Self::Domain(domain),
            (None, None) => Self::Scan { limit },
        };
        Ok(query)
    }

    /// Whether `record` belongs in the result; a scan accepts everything
    pub fn matches(&self, record: &StoredCredential) -> bool {
        match self {
            Self::Email(email) => record.email == *email,
            Self::Domain(domain) => record.domain == *domain,
            Self::Scan { .. } => true,
        }
    }

    /// Upper bound on the result size, if any
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Scan { limit } => Some(*limit),
            _ => None,
        }
    }

    /// Apply the query to records already in memory
    pub fn select(&self, records: impl IntoIterator<Item = StoredCredential>) -> Vec<StoredCredential> {
        records
            .into_iter()
            .filter(|record| self.matches(record))
            .take(self.limit().unwrap_or(usize::MAX))
            .collect()
    }
}

/// Store that can answer credential lookups
#[async_trait]
pub trait CredentialLookup: Send + Sync {
    /// Every record matching `query`; an empty result is not an error here
    async fn find(&self, query: &LookupQuery) -> Result<Vec<StoredCredential>>;
}

/// Run a lookup, treating an empty result as `NotFound`
#[instrument(skip(store))]
pub async fn lookup<L>(store: &L, query: &LookupQuery) -> Result<Vec<StoredCredential>>
where
    L: CredentialLookup + ?Sized,
{
    let records = store.find(query).await?;
    if records.is_empty() {
        return Err(IngestError::NotFound("No credentials found".to_string()));
    }
    debug!(records = records.len(), "Lookup matched");
    Ok(records)
}
