//! Mapping model error types

use thiserror::Error;

/// Errors raised while loading or validating a mapping model
#[derive(Debug, Error)]
pub enum ModelError {
    /// Missing required property in a mapping entity
    #[error("Missing required property: {0}")]
    MissingProperty(String),

    /// Invalid property value
    #[error("Invalid value for {property}: {message}")]
    InvalidValue {
        property: String,
        message: String,
    },

    /// Structurally malformed mapping entity
    #[error("Malformed mapping: {0}")]
    Malformed(String),

    /// Reference to a TriplesMap that does not exist in the document
    #[error("Unknown TriplesMap: {0}")]
    UnknownTriplesMap(String),
}

/// Result type for mapping model operations
pub type ModelResult<T> = Result<T, ModelError>;
