//! Error types for relsync operations.

use std::fmt;

/// The primary error type for all relsync operations.
#[derive(Debug)]
pub enum Error {
    /// Configuration errors (raised at resolution/init time)
    Config(ConfigError),
    /// Statement execution errors
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// A user-supplied transform or value provider failed
    Transform(TransformError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Attribute or field name is not configured
    UnknownAttribute,
    /// The primary record does not declare the named relation
    UnknownRelation,
    /// A derived field name collides with another registered name
    AmbiguousField,
    /// Primary record (or related table) uses a multi-column key
    CompositePrimaryKey,
    /// Primary record has no key value yet
    MissingPrimaryKey,
    /// Relation shape is neither many-to-many nor one-to-many
    UnsupportedRelation,
    /// A transform reference does not resolve to a function
    NotCallable,
    /// Table or column name is not a plain SQL identifier
    InvalidIdentifier,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Deadlock or serialization failure
    Conflict,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransformError {
    pub attribute: String,
    pub message: String,
}

impl Error {
    /// Build a configuration error.
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            kind,
            message: message.into(),
        })
    }

    /// Build a transform error for the given attribute.
    pub fn transform(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transform(TransformError {
            attribute: attribute.into(),
            message: message.into(),
        })
    }

    /// Is this a configuration error?
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Kind of configuration error, if this is one.
    pub fn config_kind(&self) -> Option<ConfigErrorKind> {
        match self {
            Error::Config(c) => Some(c.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Transform(e) => {
                write!(f, "Transform error on '{}': {}", e.attribute, e.message)
            }
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransformError> for Error {
    fn from(err: TransformError) -> Self {
        Error::Transform(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for relsync operations.
pub type Result<T> = std::result::Result<T, Error>;
