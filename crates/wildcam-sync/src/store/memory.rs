//! In-memory pull source store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use wildcam_common::types::{NewPullSource, PullSource};

use super::{advances_cursor, PullSourceStore};
use crate::error::StoreError;

/// Store backed by a `HashMap` behind an async `RwLock`
#[derive(Default)]
pub struct MemoryPullSourceStore {
    sources: RwLock<HashMap<Uuid, PullSource>>,
}

impl MemoryPullSourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully-formed record, bypassing name checks
    pub async fn insert(&self, source: PullSource) {
        self.sources.write().await.insert(source.id, source);
    }

    pub async fn len(&self) -> usize {
        self.sources.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sources.read().await.is_empty()
    }
}

fn sorted_by_name(mut sources: Vec<PullSource>) -> Vec<PullSource> {
    sources.sort_by(|a, b| a.name.cmp(&b.name));
    sources
}

#[async_trait]
impl PullSourceStore for MemoryPullSourceStore {
    async fn create(&self, source: NewPullSource) -> Result<PullSource, StoreError> {
        let mut sources = self.sources.write().await;
        let record = source.into_source(Utc::now());

        if sources.values().any(|s| s.name == record.name) {
            return Err(StoreError::DuplicateName(record.name));
        }

        sources.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<PullSource, StoreError> {
        self.sources
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn get_all_active(&self) -> Result<Vec<PullSource>, StoreError> {
        let sources = self.sources.read().await;
        Ok(sorted_by_name(
            sources.values().filter(|s| s.is_active).cloned().collect(),
        ))
    }

    async fn list_active_for_owner(
        &self,
        owner_user_id: &str,
    ) -> Result<Vec<PullSource>, StoreError> {
        let sources = self.sources.read().await;
        Ok(sorted_by_name(
            sources
                .values()
                .filter(|s| s.is_active && s.owner_user_id == owner_user_id)
                .cloned()
                .collect(),
        ))
    }

    async fn update_cursor(
        &self,
        id: Uuid,
        filename: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut sources = self.sources.write().await;
        let source = sources.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if !advances_cursor(source.cursor.as_deref(), filename) {
            return Ok(false);
        }

        source.cursor = Some(filename.to_string());
        source.last_sync_at = Some(timestamp);
        source.updated_at = Utc::now();
        Ok(true)
    }

    async fn record_sync(&self, id: Uuid, timestamp: DateTime<Utc>) -> Result<(), StoreError> {
        let mut sources = self.sources.write().await;
        let source = sources.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        source.last_sync_at = Some(timestamp);
        Ok(())
    }

    async fn update_active_status(&self, id: Uuid, is_active: bool) -> Result<(), StoreError> {
        let mut sources = self.sources.write().await;
        let source = sources.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        source.is_active = is_active;
        source.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.sources
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
