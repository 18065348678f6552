//! Heuristic parser for credential dump lines
//!
//! Dumps mix `email:password`, `password:email`, `email,password`,
//! `email;password` and bare emails. The parser normalizes `,` and `;` to `:`,
//! splits, and applies a fixed set of rules:
//!
//! - two tokens: the first is the email if it contains `@`, otherwise the
//!   second is taken as the email and the first as the password
//! - one token containing `@`: email only, empty password
//! - anything else: nothing is derived
//!
//! Username and domain are only derived from an email that contains `@`.
//! Missing email/domain are replaced by sentinels, so every line yields a
//! record. The parser never fails and never trims or lowercases.
//!
//! # Example
//!
//! ```
//! use leakvault_ingest::parser::CredentialParser;
//!
//! let parser = CredentialParser::default();
//! let parsed = parser.parse("alice@example.com:Secret123");
//! assert_eq!(parsed.username, "alice");
//! assert_eq!(parsed.domain, "example.com");
//! assert_eq!(parsed.password.as_str(), "Secret123");
//! ```

use zeroize::Zeroizing;

use crate::config::Sentinels;
use leakvault_common::ParsedCredential;

/// Canonical field delimiter after normalization
const DELIMITER: char = ':';

/// Alternate delimiters seen in the wild
const ALTERNATE_DELIMITERS: [char; 2] = [',', ';'];

/// Parser for one dump line at a time
#[derive(Debug, Clone, Default)]
pub struct CredentialParser {
    sentinels: Sentinels,
}

impl CredentialParser {
    pub fn new(sentinels: Sentinels) -> Self {
        Self { sentinels }
    }

    /// Parse a raw line into identity fields
    pub fn parse(&self, line: &str) -> ParsedCredential {
        let normalized = Zeroizing::new(line.replace(ALTERNATE_DELIMITERS, ":"));
        let tokens: Vec<&str> = normalized.split(DELIMITER).collect();

        let mut email = String::new();
        let mut username = String::new();
        let mut domain = String::new();
        let mut password = Zeroizing::new(String::new());

        match tokens.as_slice() {
            [first, second] => {
                let (email_token, password_token) = if first.contains('@') {
                    (first, second)
                } else {
                    (second, first)
                };
                email.push_str(email_token);
                password.push_str(password_token);
                if let Some((user, dom)) = split_address(&email) {
                    username = user;
                    domain = dom;
                }
            },
            [only] if only.contains('@') => {
                email.push_str(only);
                if let Some((user, dom)) = split_address(&email) {
                    username = user;
                    domain = dom;
                }
            },
            _ => {},
        }

        if domain.is_empty() {
            domain = self.sentinels.domain.clone();
        }
        if email.is_empty() {
            email = self.sentinels.email.clone();
        }

        ParsedCredential {
            email,
            username,
            domain,
            password,
        }
    }
}

/// Username and domain of an address, or `None` without an `@`
///
/// Only the first two `@`-separated segments are used: `a@b@c` yields
/// `("a", "b")`.
fn split_address(email: &str) -> Option<(String, String)> {
    let mut segments = email.split('@');
    let username = segments.next()?;
    let domain = segments.next()?;
    Some((username.to_string(), domain.to_string()))
}
