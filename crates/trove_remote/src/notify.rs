//! Notification gateway abstraction

use crate::error::{RemoteError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;

/// A message to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    /// Attached only if the file exists at send time
    pub attachment: Option<PathBuf>,
    /// Blind-copy the sender
    pub bcc_self: bool,
}

/// What a successful send did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipients: Vec<String>,
    pub attached: bool,
    /// Server response or other transport detail
    pub diagnostics: String,
}

/// Sends a message with an optional attachment
pub trait Notifier {
    fn send(&self, notification: &Notification) -> Result<Delivery>;
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[_a-z0-9-]+(\.[_a-z0-9-]+)*@[a-z0-9-]+(\.[a-z0-9-]+)*(\.[a-z]{2,4})$")
        .expect("email pattern is valid")
});

/// Syntax check for one address, case-insensitive.
pub fn is_valid_email(address: &str) -> bool {
    EMAIL_RE.is_match(&address.trim().to_lowercase())
}

/// Fail on the first address that does not pass [`is_valid_email`].
pub fn validate_email_syntax<S: AsRef<str>>(addresses: &[S]) -> Result<()> {
    if addresses.is_empty() {
        return Err(RemoteError::InvalidAddress(String::new()));
    }
    match addresses.iter().find(|a| !is_valid_email(a.as_ref())) {
        Some(bad) => Err(RemoteError::InvalidAddress(bad.as_ref().to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_addresses() {
        for addr in ["ops@example.com", "first.last@mail.example.org", "A_B-c@host-1.io", " ops@example.com "] {
            assert!(is_valid_email(addr), "{addr}");
        }
    }

    #[test]
    fn test_invalid_addresses() {
        for addr in ["", "no-at-sign", "a@b", "a@b.toolongtld", "a b@example.com", "a@@example.com", "a+tag@example.com"] {
            assert!(!is_valid_email(addr), "{addr}");
        }
    }

    #[test]
    fn test_validate_reports_first_bad() {
        let err = validate_email_syntax(&["ok@example.com", "broken", "also bad"]).unwrap_err();
        assert!(matches!(err, RemoteError::InvalidAddress(ref a) if a == "broken"));
        assert!(validate_email_syntax(&["ok@example.com"]).is_ok());
        assert!(validate_email_syntax::<&str>(&[]).is_err());
    }
}
