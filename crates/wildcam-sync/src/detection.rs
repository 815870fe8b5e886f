//! Detection pipeline client
//!
//! The engine hands every fetched image to a [`DetectionPipeline`] and only
//! cares whether it succeeded. Model inference lives in a separate service.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::error::DetectionError;

/// One image and the attribution it is ingested under
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub image: Vec<u8>,
    pub filename: String,
    pub location_id: Uuid,
    pub owner_user_id: String,
    /// Capture time: the remote modification time when known, else ingestion time
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionOutcome {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Consumes raw image bytes and reports detections
#[async_trait]
pub trait DetectionPipeline: Send + Sync {
    async fn process(&self, request: DetectionRequest) -> Result<DetectionOutcome, DetectionError>;
}

/// Detection service reached over HTTP
///
/// Posts the image body as `application/octet-stream`; attribution travels in
/// query parameters and the service answers `{"detections": [...]}`.
pub struct HttpDetectionPipeline {
    client: Client,
    endpoint: String,
}

impl HttpDetectionPipeline {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DetectionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, endpoint))
    }

    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl DetectionPipeline for HttpDetectionPipeline {
    async fn process(&self, request: DetectionRequest) -> Result<DetectionOutcome, DetectionError> {
        let location_id = request.location_id.to_string();
        let timestamp = request.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true);

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[
                ("location_id", location_id.as_str()),
                ("owner_user_id", request.owner_user_id.as_str()),
                ("timestamp", timestamp.as_str()),
                ("filename", request.filename.as_str()),
            ])
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(request.image)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::Rejected(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DetectionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let outcome: DetectionOutcome = response
            .json()
            .await
            .map_err(|e| DetectionError::InvalidResponse(e.to_string()))?;

        debug!(
            filename = %request.filename,
            detections = outcome.detections.len(),
            "Detection completed"
        );
        Ok(outcome)
    }
}
