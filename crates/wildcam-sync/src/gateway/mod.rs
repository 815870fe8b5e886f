//! Transport gateways: list and fetch files on a remote camera feed
//!
//! The orchestrator only sees [`TransportGateway`]; concrete transports are
//! chosen by a [`GatewayFactory`] from the source's persisted auth config.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use url::Url;
use wildcam_common::types::{AuthConfig, PullSource};

use crate::error::TransportError;

pub mod http_directory;

pub use http_directory::{normalize_base_url, HttpDirectoryGateway, IMAGE_EXTENSIONS};

/// A file advertised by a remote listing. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub filename: String,
    /// Resolved location used to fetch the bytes
    pub url: Url,
    pub modified_at: Option<DateTime<Utc>>,
}

/// How the stored cursor related to the current listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStatus {
    /// No cursor yet; the whole listing is new
    Initial,
    /// Cursor found; only files after it are new
    Resumed,
    /// Cursor absent from the listing; nothing is returned
    Missing,
}

/// Files to process on this run, in ascending filename order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFiles {
    pub files: Vec<RemoteFile>,
    pub cursor_status: CursorStatus,
}

/// List and fetch files over one transport
#[async_trait]
pub trait TransportGateway: Send + Sync {
    /// Every eligible file, sorted ascending by filename
    ///
    /// Repeated calls against an unchanged remote return the same sequence.
    async fn list_files(&self) -> Result<Vec<RemoteFile>, TransportError>;

    async fn fetch_file(&self, file: &RemoteFile) -> Result<Vec<u8>, TransportError>;

    /// Files strictly after `cursor`
    async fn get_new_files(&self, cursor: Option<&str>) -> Result<NewFiles, TransportError> {
        let listing = self.list_files().await?;
        Ok(select_new_files(listing, cursor))
    }
}

/// Apply the cursor policy to a listing
///
/// When the cursor no longer appears in the listing (the remote rotated or
/// reorganised its files) nothing is returned, rather than the full history.
pub fn select_new_files(mut listing: Vec<RemoteFile>, cursor: Option<&str>) -> NewFiles {
    listing.sort_by(|a, b| a.filename.cmp(&b.filename));
    listing.dedup_by(|a, b| a.filename == b.filename);

    let Some(cursor) = cursor else {
        return NewFiles {
            files: listing,
            cursor_status: CursorStatus::Initial,
        };
    };

    match listing.binary_search_by(|f| f.filename.as_str().cmp(cursor)) {
        Ok(index) => NewFiles {
            files: listing.split_off(index + 1),
            cursor_status: CursorStatus::Resumed,
        },
        Err(_) => NewFiles {
            files: Vec::new(),
            cursor_status: CursorStatus::Missing,
        },
    }
}

/// Builds the gateway for a source
pub trait GatewayFactory: Send + Sync {
    fn build(&self, source: &PullSource) -> Result<Box<dyn TransportGateway>, TransportError>;
}

/// Production factory; every auth variant is served over HTTP directory listings
#[derive(Clone)]
pub struct DefaultGatewayFactory {
    client: reqwest::Client,
}

impl DefaultGatewayFactory {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl GatewayFactory for DefaultGatewayFactory {
    fn build(&self, source: &PullSource) -> Result<Box<dyn TransportGateway>, TransportError> {
        // New transports hook in here, keyed on the source's configuration.
        let gateway = match &source.auth_config {
            auth @ (AuthConfig::None | AuthConfig::Basic { .. } | AuthConfig::Header { .. }) => {
                HttpDirectoryGateway::new(self.client.clone(), &source.base_url, auth)?
            },
        };
        Ok(Box::new(gateway))
    }
}
