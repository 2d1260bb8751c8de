//! BGG API token handling
//!
//! The bearer token is attached to every outbound request but is never
//! logged; `Debug` hides it and `masked` gives a truncated form.

use std::fmt;

/// Secure string wrapper that masks sensitive data in logs
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: String) -> Self {
        SecretString(value)
    }

    /// Returns the raw secret
    ///
    /// Only call this when building the `Authorization` header.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// Masked form for logs: `first4...last4`, or `***` for short values
    pub fn masked(&self) -> String {
        let s = &self.0;
        if s.chars().count() <= 8 {
            return "***".to_string();
        }
        let head: String = s.chars().take(4).collect();
        let tail: String = s.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("{}...{}", head, tail)
    }

    /// Wrap a token read from configuration, trimming whitespace
    ///
    /// Blank values mean "no token".
    pub fn from_config_value(value: &str) -> Option<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(SecretString::new(trimmed.to_string()))
        }
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString(***)")
    }
}
