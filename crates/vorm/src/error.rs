//! Error types for vorm

use thiserror::Error;

/// Result type alias for vorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for mapping, query generation and execution.
#[derive(Debug, Error)]
pub enum OrmError {
    /// Invalid or missing configuration: schema/entity names, duplicate
    /// declarations, multiple identity columns, unmappable types.
    #[error("Configuration error on {aggregate}: {message}")]
    Configuration { aggregate: String, message: String },

    /// The requested operation cannot be expressed for this aggregate.
    #[error("Unsupported operation on {aggregate}: {message}")]
    Unsupported { aggregate: String, message: String },

    /// A property reference or value does not match the aggregate's structure.
    #[error("Mapping error on {aggregate}: {message}")]
    Mapping { aggregate: String, message: String },

    /// Row decode error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Error reported by an executor implementation
    #[error("Executor error: {0}")]
    Executor(String),

    /// Query execution error
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a configuration error for an aggregate type
    pub fn configuration(aggregate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            aggregate: aggregate.into(),
            message: message.into(),
        }
    }

    /// Create an operation-unsupported error for an aggregate type
    pub fn unsupported(aggregate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            aggregate: aggregate.into(),
            message: message.into(),
        }
    }

    /// Create a mapping error for an aggregate type
    pub fn mapping(aggregate: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Mapping {
            aggregate: aggregate.into(),
            message: message.into(),
        }
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

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Check if this is an operation-unsupported error
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Check if this is a mapping error
    pub fn is_mapping(&self) -> bool {
        matches!(self, Self::Mapping { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
