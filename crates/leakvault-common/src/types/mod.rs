//! Credential records shared by the ingest job and anything reading the table

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zeroize::Zeroizing;

/// Placeholder stored when no email can be derived from a line
pub const UNKNOWN_EMAIL: &str = "empty_email";

/// Placeholder stored when no domain can be derived from a line
pub const UNKNOWN_DOMAIN: &str = "empty_domain";

/// Identity fields pulled out of one dump line, plaintext password included
///
/// `email` and `domain` are never empty once the parser is done with them;
/// `username` and `password` may be. The password buffer is wiped on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct ParsedCredential {
    pub email: String,
    pub username: String,
    pub domain: String,
    pub password: Zeroizing<String>,
}

impl ParsedCredential {
    /// Swap the plaintext for its hash and assign a fresh identifier
    ///
    /// Consumes `self`, so the plaintext is dropped (and zeroed) here.
    pub fn into_stored(self, password_hash: String) -> StoredCredential {
        StoredCredential {
            id: Uuid::new_v4(),
            email: self.email,
            username: self.username,
            domain: self.domain,
            password_hash,
        }
    }
}

impl std::fmt::Debug for ParsedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedCredential")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("domain", &self.domain)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Persisted form of a credential
///
/// The hash is written under the `password` attribute, which is what the
/// credentials table and its readers expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredential {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub domain: String,
    #[serde(rename = "password")]
    pub password_hash: String,
}
