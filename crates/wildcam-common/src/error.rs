//! Error types for wildcam domain models

use thiserror::Error;

/// Result type alias for model validation
pub type Result<T> = std::result::Result<T, ModelError>;

/// Validation failure on a domain model
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Invalid source name: {0}")]
    InvalidName(String),

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Invalid auth configuration: {0}")]
    InvalidAuth(String),

    #[error("Missing owner user id")]
    MissingOwner,
}
