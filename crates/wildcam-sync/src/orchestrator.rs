//! Sync orchestrator
//!
//! Drives one run per source: list new files after the stored cursor, fetch
//! each in filename order, hand it to the detection pipeline, and commit the
//! cursor after every success. A failed file is recorded and skipped; the run
//! continues with the next one.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use wildcam_common::types::{FileFailure, PullSource, SourceOutcome, SweepSummary, SyncResult};

use crate::config::SyncConfig;
use crate::detection::{DetectionPipeline, DetectionRequest};
use crate::error::{DetectionError, Result, SyncError, TransportError};
use crate::gateway::{CursorStatus, GatewayFactory, RemoteFile, TransportGateway};
use crate::locks::SourceLocks;
use crate::store::PullSourceStore;

/// Upper bounds on each remote call made during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTimeouts {
    pub listing: Duration,
    pub fetch: Duration,
    pub detection: Duration,
}

impl Default for SyncTimeouts {
    fn default() -> Self {
        Self {
            listing: Duration::from_secs(crate::config::DEFAULT_HTTP_TIMEOUT_SECS),
            fetch: Duration::from_secs(crate::config::DEFAULT_HTTP_TIMEOUT_SECS),
            detection: Duration::from_secs(crate::config::DEFAULT_DETECTION_TIMEOUT_SECS),
        }
    }
}

impl SyncTimeouts {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            listing: config.http_timeout(),
            fetch: config.http_timeout(),
            detection: config.detection_timeout(),
        }
    }
}

/// Why a single file was not ingested
#[derive(Debug, Error)]
enum FileError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] TransportError),

    #[error("detection failed: {0}")]
    Detection(#[from] DetectionError),
}

pub struct SyncOrchestrator {
    store: Arc<dyn PullSourceStore>,
    gateways: Arc<dyn GatewayFactory>,
    detection: Arc<dyn DetectionPipeline>,
    locks: SourceLocks,
    timeouts: SyncTimeouts,
    source_parallelism: usize,
    stopping: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn PullSourceStore>,
        gateways: Arc<dyn GatewayFactory>,
        detection: Arc<dyn DetectionPipeline>,
    ) -> Self {
        Self {
            store,
            gateways,
            detection,
            locks: SourceLocks::new(),
            timeouts: SyncTimeouts::default(),
            source_parallelism: crate::config::DEFAULT_SOURCE_PARALLELISM,
            stopping: AtomicBool::new(false),
        }
    }

    pub fn with_timeouts(mut self, timeouts: SyncTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// How many sources a sweep syncs at once (at least one)
    pub fn with_source_parallelism(mut self, parallelism: usize) -> Self {
        self.source_parallelism = parallelism.max(1);
        self
    }

    pub fn locks(&self) -> &SourceLocks {
        &self.locks
    }

    pub fn store(&self) -> &Arc<dyn PullSourceStore> {
        &self.store
    }

    /// Ask in-flight runs to stop before their next file
    ///
    /// A file already being fetched or processed is allowed to finish and
    /// commit its cursor.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Sync one source, processing at most `max_files` new files
    ///
    /// Fails with [`SyncError::AlreadySyncing`] when another run holds the
    /// source, [`SyncError::NotFound`] for an unknown id, and
    /// [`SyncError::Transport`] when the listing itself cannot be obtained.
    /// Per-file failures are reported in the result instead.
    #[instrument(skip(self), fields(source_id = %source_id))]
    pub async fn pull_and_process_source(
        &self,
        source_id: Uuid,
        max_files: usize,
    ) -> Result<SyncResult> {
        let _guard = self
            .locks
            .try_acquire(source_id)
            .ok_or(SyncError::AlreadySyncing(source_id))?;

        let started_at = Utc::now();
        let source = self.store.get_by_id(source_id).await?;

        if !source.is_active {
            info!(source = %source.name, "Source is inactive, skipping");
            return Ok(SyncResult::inactive(&source, started_at));
        }

        let gateway = self.gateways.build(&source)?;

        let new_files = bounded(
            self.timeouts.listing,
            gateway.get_new_files(source.cursor.as_deref()),
        )
        .await
        .unwrap_or_else(|after| {
            Err(TransportError::Timeout {
                url: source.base_url.clone(),
                after,
            })
        })?;

        let cursor_missing = new_files.cursor_status == CursorStatus::Missing;
        if cursor_missing {
            warn!(
                source = %source.name,
                cursor = source.cursor.as_deref().unwrap_or_default(),
                "Stored cursor not found in remote listing, no files selected"
            );
        }

        let available = new_files.files.len();
        let batch: Vec<RemoteFile> = new_files.files.into_iter().take(max_files).collect();
        info!(
            source = %source.name,
            available,
            selected = batch.len(),
            cursor_status = ?new_files.cursor_status,
            "Starting sync run"
        );

        let mut resulting_cursor = source.cursor.clone();
        let mut files_attempted = 0;
        let mut files_succeeded = 0;
        let mut failures = Vec::new();

        for file in batch {
            if self.is_stopping() {
                info!(source = %source.name, "Shutdown requested, ending run early");
                break;
            }
            files_attempted += 1;

            match self.ingest_file(&source, gateway.as_ref(), &file).await {
                Ok(()) => {
                    debug!(filename = %file.filename, "File ingested");
                    files_succeeded += 1;
                    // A store failure here escalates; the file is not retried.
                    if self
                        .store
                        .update_cursor(source.id, &file.filename, Utc::now())
                        .await?
                    {
                        resulting_cursor = Some(file.filename);
                    }
                },
                Err(e) => {
                    warn!(source = %source.name, filename = %file.filename, error = %e, "File failed");
                    failures.push(FileFailure {
                        filename: file.filename,
                        reason: e.to_string(),
                    });
                },
            }
        }

        let finished_at = Utc::now();
        if resulting_cursor == source.cursor {
            self.store.record_sync(source.id, finished_at).await?;
        }

        info!(
            source = %source.name,
            attempted = files_attempted,
            succeeded = files_succeeded,
            failed = failures.len(),
            cursor = resulting_cursor.as_deref().unwrap_or_default(),
            "Sync run finished"
        );

        Ok(SyncResult {
            source_id: source.id,
            files_attempted,
            files_succeeded,
            failures,
            resulting_cursor,
            cursor_missing,
            skipped_inactive: false,
            started_at,
            finished_at,
        })
    }

    /// Sync every active source, up to `max_files_per_source` files each
    ///
    /// One source failing never stops the others. Only infrastructure store
    /// failures abort the sweep, after in-flight sources have finished.
    pub async fn pull_and_process_all_active_sources(
        &self,
        max_files_per_source: usize,
    ) -> Result<SweepSummary> {
        let sources = self.store.get_all_active().await?;
        if sources.is_empty() {
            info!("No active sources to sync");
            return Ok(SweepSummary::default());
        }
        info!(sources = sources.len(), parallelism = self.source_parallelism, "Starting sweep");

        let results: Vec<(Uuid, Result<SyncResult>)> = stream::iter(sources)
            .map(|source| async move {
                let id = source.id;
                (id, self.pull_and_process_source(id, max_files_per_source).await)
            })
            .buffered(self.source_parallelism)
            .collect()
            .await;

        let mut summary = SweepSummary::default();
        let mut escalated = None;

        for (source_id, result) in results {
            let outcome = match result {
                Ok(result) => SourceOutcome::Synced { result },
                Err(SyncError::AlreadySyncing(_)) => SourceOutcome::Skipped {
                    source_id,
                    reason: "sync already in progress".to_string(),
                },
                Err(e) if e.is_infrastructure() => {
                    error!(source_id = %source_id, error = %e, "Store failure during sweep");
                    escalated.get_or_insert(e);
                    continue;
                },
                Err(e) => {
                    warn!(source_id = %source_id, error = %e, "Source sync failed");
                    SourceOutcome::Failed {
                        source_id,
                        error: e.to_string(),
                    }
                },
            };
            summary.record(outcome);
        }

        if let Some(e) = escalated {
            return Err(e);
        }

        info!(
            sources = summary.sources_total,
            synced = summary.sources_synced,
            skipped = summary.sources_skipped,
            failed = summary.sources_failed,
            files_succeeded = summary.files_succeeded,
            files_failed = summary.files_failed,
            "Sweep finished"
        );
        Ok(summary)
    }

    async fn ingest_file(
        &self,
        source: &PullSource,
        gateway: &dyn TransportGateway,
        file: &RemoteFile,
    ) -> std::result::Result<(), FileError> {
        let image = bounded(self.timeouts.fetch, gateway.fetch_file(file))
            .await
            .unwrap_or_else(|after| {
                Err(TransportError::Timeout {
                    url: file.url.to_string(),
                    after,
                })
            })?;

        let request = DetectionRequest {
            image,
            filename: file.filename.clone(),
            location_id: source.target_location_id,
            owner_user_id: source.owner_user_id.clone(),
            timestamp: file.modified_at.unwrap_or_else(Utc::now),
        };

        bounded(self.timeouts.detection, self.detection.process(request))
            .await
            .unwrap_or_else(|after| Err(DetectionError::Timeout(after)))?;
        Ok(())
    }
}

/// Run `fut` under `limit`, yielding the limit back on expiry
async fn bounded<F: Future>(limit: Duration, fut: F) -> std::result::Result<F::Output, Duration> {
    timeout(limit, fut).await.map_err(|_| limit)
}
