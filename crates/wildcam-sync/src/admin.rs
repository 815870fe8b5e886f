//! Administrative operations on pull sources
//!
//! Thin layer over the store and orchestrator for callers that manage sources
//! on behalf of a user. Callers are expected to have authenticated the owner
//! already; this layer only validates input.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use wildcam_common::types::{NewPullSource, PullSource, SyncResult};

use crate::error::Result;
use crate::orchestrator::SyncOrchestrator;
use crate::store::PullSourceStore;

pub struct SourceAdmin {
    store: Arc<dyn PullSourceStore>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl SourceAdmin {
    pub fn new(orchestrator: Arc<SyncOrchestrator>) -> Self {
        Self {
            store: Arc::clone(orchestrator.store()),
            orchestrator,
        }
    }

    /// Validate and persist a new source with an empty cursor
    pub async fn create_source(&self, source: NewPullSource) -> Result<PullSource> {
        source.validate()?;
        let created = self.store.create(source).await?;
        info!(source_id = %created.id, name = %created.name, "Pull source created");
        Ok(created)
    }

    pub async fn get_source(&self, id: Uuid) -> Result<PullSource> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn list_active_sources_for_owner(&self, owner_user_id: &str) -> Result<Vec<PullSource>> {
        Ok(self.store.list_active_for_owner(owner_user_id).await?)
    }

    /// Run a sync now; refused while another run holds the source
    pub async fn trigger_manual_sync(&self, id: Uuid, max_files: usize) -> Result<SyncResult> {
        info!(source_id = %id, max_files, "Manual sync requested");
        self.orchestrator.pull_and_process_source(id, max_files).await
    }

    /// Enable or disable a source; the cursor is kept either way
    pub async fn toggle_active(&self, id: Uuid, is_active: bool) -> Result<PullSource> {
        self.store.update_active_status(id, is_active).await?;
        info!(source_id = %id, is_active, "Pull source active status changed");
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn delete_source(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await?;
        info!(source_id = %id, "Pull source deleted");
        Ok(())
    }
}
