//! Error types for selectqb

use thiserror::Error;

/// Result type alias for selectqb operations
pub type QbResult<T> = Result<T, QbError>;

/// Errors raised while building, parsing or executing a query
#[derive(Debug, Error)]
pub enum QbError {
    /// A select list or statement could not be tokenized
    #[error("Parse error: {message}\n---------------------------------------\n{input}")]
    Parse { message: String, input: String },

    /// Clause state cannot be rendered (e.g. OFFSET without ORDER BY)
    #[error("Validation error: {0}")]
    Validation(String),

    /// An input value whose SQL type cannot be inferred
    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    /// The query round trip failed
    #[error("{0}")]
    Driver(String),

    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Row or record set not found
    #[error("Not found: {0}")]
    NotFound(String),
}

impl QbError {
    /// Create a parse error that keeps the offending text for diagnosis
    pub fn parse(message: impl Into<String>, input: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            input: input.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unsupported input error
    pub fn unsupported_input(message: impl Into<String>) -> Self {
        Self::UnsupportedInput(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a parse error
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is a driver error
    pub fn is_driver(&self) -> bool {
        matches!(self, Self::Driver(_))
    }

    /// Normalize a driver-side failure to its message.
    ///
    /// Postgres server errors carry their own message; anything else falls back to
    /// the error's display form.
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_err) => Self::Driver(db_err.message().to_string()),
            None => Self::Driver(err.to_string()),
        }
    }
}

impl From<tokio_postgres::Error> for QbError {
    fn from(err: tokio_postgres::Error) -> Self {
        Self::from_db_error(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for QbError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
