//! Error types for the sync engine
//!
//! Errors are split by boundary so callers can decide how far each one travels:
//! transport and detection failures stop at the current file, a source-level
//! failure stops at the current source, and store failures escalate.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;
use wildcam_common::ModelError;

/// Result type alias for engine operations
pub type Result<T, E = SyncError> = std::result::Result<T, E>;

/// Listing or fetching over a transport failed
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Request to {url} timed out after {after:?}")]
    Timeout { url: String, after: Duration },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Malformed directory listing from {url}: {reason}")]
    Protocol { url: String, reason: String },

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
}

impl TransportError {
    pub fn from_reqwest(url: impl Into<String>, err: reqwest::Error) -> Self {
        let url = url.into();
        match err.status() {
            Some(status) => TransportError::Status {
                url,
                status: status.as_u16(),
            },
            None => TransportError::Request { url, source: err },
        }
    }

    /// HTTP status of the failed response, when there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether retrying on a later sync could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Timeout { .. } => true,
            TransportError::Request { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            },
            TransportError::InvalidUrl { .. }
            | TransportError::Protocol { .. }
            | TransportError::InvalidCredentials(_) => false,
        }
    }
}

/// The downstream detection pipeline failed for one image
#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Detection service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Detection request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Detection timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid detection response: {0}")]
    InvalidResponse(String),

    #[error("Image rejected by detection pipeline: {0}")]
    Rejected(String),
}

/// The persistence layer failed
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Pull source not found: {0}")]
    NotFound(Uuid),

    #[error("A pull source named '{0}' already exists")]
    DuplicateName(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt auth config for source {id}: {source}")]
    CorruptRecord {
        id: Uuid,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// The store itself is unreachable or broken, as opposed to a bad request
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            StoreError::Database(_) | StoreError::Unavailable(_) | StoreError::CorruptRecord { .. }
        )
    }
}

/// Engine-level failure for a sync or administrative operation
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Pull source not found: {0}")]
    NotFound(Uuid),

    #[error("Pull source {0} is already syncing")]
    AlreadySyncing(Uuid),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ModelError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SyncError::NotFound(id),
            other => SyncError::Store(other),
        }
    }
}

impl SyncError {
    /// Failures that must abort a sweep instead of being recorded per source
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, SyncError::Store(e) if e.is_infrastructure())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_status_classification() {
        let server_error = TransportError::Status {
            url: "http://cam/".to_string(),
            status: 503,
        };
        let not_found = TransportError::Status {
            url: "http://cam/a.jpg".to_string(),
            status: 404,
        };
        let throttled = TransportError::Status {
            url: "http://cam/".to_string(),
            status: 429,
        };

        assert_eq!(server_error.status(), Some(503));
        assert!(server_error.is_transient());
        assert!(!not_found.is_transient());
        assert!(throttled.is_transient());
        assert!(TransportError::Timeout {
            url: "http://cam/".to_string(),
            after: Duration::from_secs(30),
        }
        .is_transient());
    }

    #[test]
    fn test_store_not_found_maps_to_sync_not_found() {
        let id = Uuid::new_v4();
        let err: SyncError = StoreError::NotFound(id).into();
        assert!(matches!(err, SyncError::NotFound(found) if found == id));
        assert!(!err.is_infrastructure());
    }

    #[test]
    fn test_infrastructure_classification() {
        let down: SyncError = StoreError::Unavailable("connection refused".to_string()).into();
        assert!(down.is_infrastructure());

        let dup: SyncError = StoreError::DuplicateName("cam".to_string()).into();
        assert!(!dup.is_infrastructure());

        let transport: SyncError = TransportError::Protocol {
            url: "http://cam/".to_string(),
            reason: "empty body".to_string(),
        }
        .into();
        assert!(!transport.is_infrastructure());
    }
}
