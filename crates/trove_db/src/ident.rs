//! Validated SQL identifiers.
//!
//! The inventory table name comes from configuration. It is checked against an
//! allow-list once, at startup, and is only ever emitted double-quoted.

use crate::error::{DbError, Result};
use std::fmt;

const MAX_IDENT_LEN: usize = 63;

/// A table name that passed the allow-list
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableName(String);

impl TableName {
    /// Accepts `[A-Za-z_][A-Za-z0-9_]*`, 1 to 63 characters.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut chars = raw.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if valid_start && valid_rest && raw.len() <= MAX_IDENT_LEN {
            Ok(Self(raw.to_string()))
        } else {
            Err(DbError::InvalidIdentifier(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier as it appears in SQL.
    pub fn quoted(&self) -> String {
        quote_ident(&self.0)
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TableName {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn quote_ident(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push('"');
    for ch in name.chars() {
        if ch == '"' {
            escaped.push('"');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    escaped
}
