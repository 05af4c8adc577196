//! Error types for the explorer core

use thiserror::Error;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum Error {
    /// Data source failure while fetching a page or lookup
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Response body did not have the expected shape
    #[error("Malformed response from {path}: {message}")]
    MalformedResponse {
        /// Request path that produced the response
        path: String,
        /// Description of the shape mismatch
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The owning view was torn down before the result arrived
    #[error("Request cancelled")]
    Cancelled,
}

/// Data source errors
///
/// Returned by [`crate::query::DataSource`] implementations. `NotFound` is a
/// regular outcome for single-entity lookups and is mapped to an absent value
/// by the resolution layer rather than propagated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Backend answered with a non-success status
    #[error("HTTP {status} for {path}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Request path
        path: String,
    },

    /// Requested entity does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Connection or request could not be completed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Body could not be decoded as JSON
    #[error("Decode error: {0}")]
    Decode(String),
}

impl TransportError {
    /// True when the failure means "no such entity"
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            TransportError::NotFound(_) | TransportError::Status { status: 404, .. }
        )
    }
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("IO error on {path}: {source}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file could not be parsed
    #[error("Failed to parse config file {path}: {message}")]
    Parse {
        /// File path
        path: String,
        /// Parser message
        message: String,
    },

    /// Config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    /// Value is out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Field name being validated
        field: String,
        /// The invalid value
        value: String,
        /// Minimum allowed value
        min: String,
        /// Maximum allowed value
        max: String,
    },

    /// Required field is missing or empty
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
