//! Test doubles shared by the integration tests
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use url::Url;
use uuid::Uuid;
use wildcam_common::types::{AuthConfig, NewPullSource, PullSource};
use wildcam_sync::detection::{DetectionOutcome, DetectionPipeline, DetectionRequest};
use wildcam_sync::error::{DetectionError, StoreError, TransportError};
use wildcam_sync::gateway::{GatewayFactory, RemoteFile, TransportGateway};
use wildcam_sync::orchestrator::SyncOrchestrator;
use wildcam_sync::store::{MemoryPullSourceStore, PullSourceStore};

pub const OWNER: &str = "auth0|ranger";

/// Modification time reported for every fake file
pub fn listing_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 1, 6, 30, 0).unwrap()
}

// ============================================================================
// Gateways
// ============================================================================

/// Scripted behaviour of one remote feed
#[derive(Clone, Default)]
pub struct FeedSpec {
    pub files: Vec<String>,
    pub failing_fetches: HashSet<String>,
    pub listing_fails: bool,
    pub fetch_delay: Option<Duration>,
}

impl FeedSpec {
    pub fn with_files(names: &[&str]) -> Self {
        Self {
            files: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn failing_fetch(mut self, name: &str) -> Self {
        self.failing_fetches.insert(name.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }

    pub fn slow_fetches(mut self, delay: Duration) -> Self {
        self.fetch_delay = Some(delay);
        self
    }
}

/// Remote calls observed across every gateway built by a factory
#[derive(Default)]
pub struct CallLog {
    pub listings: AtomicUsize,
    pub fetches: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn listing_count(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }
}

pub struct FakeGateway {
    base: Url,
    spec: FeedSpec,
    log: Arc<CallLog>,
}

#[async_trait]
impl TransportGateway for FakeGateway {
    async fn list_files(&self) -> Result<Vec<RemoteFile>, TransportError> {
        self.log.listings.fetch_add(1, Ordering::SeqCst);
        if self.spec.listing_fails {
            return Err(TransportError::Status {
                url: self.base.to_string(),
                status: 503,
            });
        }

        // Deliberately unsorted; the gateway contract sorts.
        let mut files: Vec<RemoteFile> = self
            .spec
            .files
            .iter()
            .rev()
            .map(|name| RemoteFile {
                filename: name.clone(),
                url: self.base.join(name).unwrap(),
                modified_at: Some(listing_time()),
            })
            .collect();
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    async fn fetch_file(&self, file: &RemoteFile) -> Result<Vec<u8>, TransportError> {
        self.log.fetches.lock().unwrap().push(file.filename.clone());
        if let Some(delay) = self.spec.fetch_delay {
            tokio::time::sleep(delay).await;
        }
        if self.spec.failing_fetches.contains(&file.filename) {
            return Err(TransportError::Status {
                url: file.url.to_string(),
                status: 404,
            });
        }
        Ok(file.filename.as_bytes().to_vec())
    }
}

/// Builds [`FakeGateway`]s keyed by the source's base URL
#[derive(Default)]
pub struct FakeGatewayFactory {
    feeds: Mutex<HashMap<String, FeedSpec>>,
    pub log: Arc<CallLog>,
}

impl FakeGatewayFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_feed(&self, base_url: &str, spec: FeedSpec) {
        self.feeds.lock().unwrap().insert(base_url.to_string(), spec);
    }
}

impl GatewayFactory for FakeGatewayFactory {
    fn build(&self, source: &PullSource) -> Result<Box<dyn TransportGateway>, TransportError> {
        let spec = self
            .feeds
            .lock()
            .unwrap()
            .get(&source.base_url)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(FakeGateway {
            base: Url::parse(&source.base_url).unwrap(),
            spec,
            log: Arc::clone(&self.log),
        }))
    }
}

// ============================================================================
// Detection
// ============================================================================

/// What the pipeline was handed, minus the bytes
#[derive(Debug, Clone, PartialEq)]
pub struct SeenImage {
    pub filename: String,
    pub bytes: usize,
    pub location_id: Uuid,
    pub owner_user_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct RecordingDetection {
    seen: Mutex<Vec<SeenImage>>,
    rejected: Mutex<HashSet<String>>,
    /// Signalled as each image arrives
    pub entered: Arc<Notify>,
    /// When set, each image waits for a permit before completing
    gate: Option<Arc<Notify>>,
}

impl RecordingDetection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    pub fn reject(&self, filename: &str) {
        self.rejected.lock().unwrap().insert(filename.to_string());
    }

    pub fn seen(&self) -> Vec<SeenImage> {
        self.seen.lock().unwrap().clone()
    }

    pub fn seen_names(&self) -> Vec<String> {
        self.seen().into_iter().map(|s| s.filename).collect()
    }
}

#[async_trait]
impl DetectionPipeline for RecordingDetection {
    async fn process(&self, request: DetectionRequest) -> Result<DetectionOutcome, DetectionError> {
        self.seen.lock().unwrap().push(SeenImage {
            filename: request.filename.clone(),
            bytes: request.image.len(),
            location_id: request.location_id,
            owner_user_id: request.owner_user_id.clone(),
            timestamp: request.timestamp,
        });
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if self.rejected.lock().unwrap().contains(&request.filename) {
            return Err(DetectionError::Rejected("unreadable image".to_string()));
        }
        Ok(DetectionOutcome::default())
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Memory store whose cursor writes always fail
#[derive(Default)]
pub struct BrokenCursorStore {
    pub inner: MemoryPullSourceStore,
}

#[async_trait]
impl PullSourceStore for BrokenCursorStore {
    async fn create(&self, source: NewPullSource) -> Result<PullSource, StoreError> {
        self.inner.create(source).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<PullSource, StoreError> {
        self.inner.get_by_id(id).await
    }

    async fn get_all_active(&self) -> Result<Vec<PullSource>, StoreError> {
        self.inner.get_all_active().await
    }

    async fn list_active_for_owner(&self, owner_user_id: &str) -> Result<Vec<PullSource>, StoreError> {
        self.inner.list_active_for_owner(owner_user_id).await
    }

    async fn update_cursor(
        &self,
        _id: Uuid,
        _filename: &str,
        _timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("connection reset".to_string()))
    }

    async fn record_sync(&self, id: Uuid, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
        self.inner.record_sync(id, timestamp).await
    }

    async fn update_active_status(&self, id: Uuid, is_active: bool) -> Result<(), StoreError> {
        self.inner.update_active_status(id, is_active).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }
}

// ============================================================================
// Fixtures
// ============================================================================

pub fn new_source(name: &str, base_url: &str) -> NewPullSource {
    NewPullSource {
        name: name.to_string(),
        owner_user_id: OWNER.to_string(),
        target_location_id: Uuid::new_v4(),
        base_url: base_url.to_string(),
        auth_config: AuthConfig::None,
        is_active: true,
    }
}

/// Orchestrator over a memory store with fake transport and detection
pub struct Harness {
    pub store: Arc<MemoryPullSourceStore>,
    pub gateways: Arc<FakeGatewayFactory>,
    pub detection: Arc<RecordingDetection>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_detection(RecordingDetection::new())
    }

    pub fn with_detection(detection: RecordingDetection) -> Self {
        let store = Arc::new(MemoryPullSourceStore::new());
        let gateways = Arc::new(FakeGatewayFactory::new());
        let detection = Arc::new(detection);
        let orchestrator = Arc::new(SyncOrchestrator::new(
            store.clone(),
            gateways.clone(),
            detection.clone(),
        ));
        Self {
            store,
            gateways,
            detection,
            orchestrator,
        }
    }

    /// Register a source backed by a scripted feed
    pub async fn add_source(&self, name: &str, feed: FeedSpec) -> PullSource {
        let base_url = format!("http://{}.cams.example.org/images/", name);
        self.gateways.set_feed(&base_url, feed);
        self.store.create(new_source(name, &base_url)).await.unwrap()
    }

    pub async fn cursor(&self, id: Uuid) -> Option<String> {
        self.store.get_by_id(id).await.unwrap().cursor
    }
}
