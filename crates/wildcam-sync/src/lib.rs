//! Wildcam pull-source sync engine
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Periodically pulls new camera-trap images from third-party feeds and hands
//! them to the detection pipeline, keeping a per-source filename cursor so each
//! file is ingested once.
//!
//! # Architecture
//!
//! - **store**: pull source registry and cursor persistence (Postgres or memory)
//! - **gateway**: listing and fetching over a transport (HTTP directory index)
//! - **detection**: client for the downstream detection service
//! - **orchestrator**: per-source runs and sweeps over all active sources
//! - **scheduler**: recurring sweeps and manual triggers
//! - **admin**: create, toggle, delete and trigger sources
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wildcam_sync::detection::HttpDetectionPipeline;
//! use wildcam_sync::gateway::DefaultGatewayFactory;
//! use wildcam_sync::orchestrator::SyncOrchestrator;
//! use wildcam_sync::store::MemoryPullSourceStore;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let orchestrator = SyncOrchestrator::new(
//!     Arc::new(MemoryPullSourceStore::new()),
//!     Arc::new(DefaultGatewayFactory::new(Duration::from_secs(30), "wildcam-sync")?),
//!     Arc::new(HttpDetectionPipeline::new(
//!         "http://localhost:8001/api/v1/detect",
//!         Duration::from_secs(120),
//!     )?),
//! );
//! let summary = orchestrator.pull_and_process_all_active_sources(10).await?;
//! println!("synced {} sources", summary.sources_synced);
//! # Ok(())
//! # }
//! ```

pub mod admin;
pub mod cli;
pub mod config;
pub mod detection;
pub mod error;
pub mod gateway;
pub mod locks;
pub mod orchestrator;
pub mod scheduler;
pub mod store;

pub use admin::SourceAdmin;
pub use config::SyncConfig;
pub use error::{DetectionError, Result, StoreError, SyncError, TransportError};
pub use orchestrator::{SyncOrchestrator, SyncTimeouts};
pub use scheduler::{IntervalJobRunner, RecurringJobRunner, SyncScheduler};
