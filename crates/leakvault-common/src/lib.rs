//! leakvault common library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Pieces shared by every leakvault crate:
//!
//! - **Logging**: subscriber setup driven by `LOG_*` environment variables
//! - **Types**: parsed and stored credential records, sentinel values
//!
//! # Example
//!
//! ```
//! use leakvault_common::types::{ParsedCredential, UNKNOWN_DOMAIN};
//! use zeroize::Zeroizing;
//!
//! let parsed = ParsedCredential {
//!     email: "bob".to_string(),
//!     username: String::new(),
//!     domain: UNKNOWN_DOMAIN.to_string(),
//!     password: Zeroizing::new(String::new()),
//! };
//! let stored = parsed.into_stored("$argon2id$...".to_string());
//! assert_eq!(stored.domain, "empty_domain");
//! ```

pub mod logging;
pub mod types;

pub use types::{ParsedCredential, StoredCredential, UNKNOWN_DOMAIN, UNKNOWN_EMAIL};
