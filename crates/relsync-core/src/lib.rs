//! Core types and traits for relsync.
//!
//! This crate provides the foundational abstractions shared by the query and
//! engine crates:
//!
//! - `Value` and `Row` for dynamically-typed SQL data
//! - `Error` for configuration, statement, key and transform failures
//! - `Connection` / `TransactionOps` for the data-access layer relsync drives
//! - `Dialect` and identifier helpers for rendering safe SQL
//! - `Outcome` re-export from asupersync for cancel-correct operations
//! - `Cx` context for structured concurrency

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod connection;
pub mod dialect;
pub mod error;
pub mod identifiers;
pub mod row;
pub mod value;

pub use connection::{Connection, IsolationLevel, TransactionOps};
pub use dialect::Dialect;
pub use error::{
    ConfigError, ConfigErrorKind, Error, QueryError, QueryErrorKind, Result, TransformError,
    TypeError,
};
pub use identifiers::{is_valid_identifier, quote_ident, quote_ident_mysql, validate_identifier};
pub use row::{ColumnInfo, Row};
pub use value::Value;
