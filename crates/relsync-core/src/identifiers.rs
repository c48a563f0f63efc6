//! SQL identifier quoting and validation.
//!
//! Table and column names reach the engine from relation shapes and from
//! configuration. They are validated once when a relation descriptor is
//! resolved and quoted again every time a statement is rendered.

use crate::error::{ConfigErrorKind, Error, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Quote a SQL identifier using ANSI double-quoting.
///
/// Embedded double-quotes are escaped by doubling them (`"` → `""`).
///
/// # Examples
///
/// ```
/// use relsync_core::quote_ident;
///
/// assert_eq!(quote_ident("book"), "\"book\"");
/// assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
/// ```
#[inline]
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL identifier using MySQL backtick quoting.
#[inline]
pub fn quote_ident_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .unwrap_or_else(|e| unreachable!("identifier pattern is valid: {e}"))
    })
}

/// Check whether `name` is a plain (optionally schema-qualified) identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    identifier_pattern().is_match(name)
}

/// Validate an identifier, naming its role in the error message.
#[allow(clippy::result_large_err)]
pub fn validate_identifier(role: &str, name: &str) -> Result<()> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        tracing::debug!(role = role, name = name, "Rejected identifier");
        Err(Error::config(
            ConfigErrorKind::InvalidIdentifier,
            format!("invalid {} name: {:?}", role, name),
        ))
    }
}
