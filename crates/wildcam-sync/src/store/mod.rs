//! Persistence boundary for pull sources and their sync cursors
//!
//! - **memory**: in-process store used by tests and dry runs
//! - **postgres**: sqlx-backed store used in deployments

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use wildcam_common::types::{NewPullSource, PullSource};

use crate::error::StoreError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryPullSourceStore;
pub use postgres::PgPullSourceStore;

/// Registry of configured sources and their cursors
///
/// Implementations must be safe to share between concurrent sync runs.
#[async_trait]
pub trait PullSourceStore: Send + Sync {
    /// Persist a new source; names are globally unique
    async fn create(&self, source: NewPullSource) -> Result<PullSource, StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<PullSource, StoreError>;

    /// Every source with `is_active = true`, ordered by name
    async fn get_all_active(&self) -> Result<Vec<PullSource>, StoreError>;

    async fn list_active_for_owner(&self, owner_user_id: &str)
        -> Result<Vec<PullSource>, StoreError>;

    /// Advance the cursor and stamp `last_sync_at` in one write
    ///
    /// A filename that does not sort strictly after the stored cursor leaves the
    /// record untouched, so the cursor never regresses. Returns whether the
    /// cursor moved.
    async fn update_cursor(
        &self,
        id: Uuid,
        filename: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Stamp `last_sync_at` without touching the cursor
    async fn record_sync(&self, id: Uuid, timestamp: DateTime<Utc>) -> Result<(), StoreError>;

    async fn update_active_status(&self, id: Uuid, is_active: bool) -> Result<(), StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Whether `candidate` may replace `current` as a source's cursor
pub(crate) fn advances_cursor(current: Option<&str>, candidate: &str) -> bool {
    match current {
        None => true,
        Some(current) => candidate > current,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_advances_cursor() {
        assert!(advances_cursor(None, "a.jpg"));
        assert!(advances_cursor(Some("a.jpg"), "b.jpg"));
        assert!(!advances_cursor(Some("b.jpg"), "b.jpg"));
        assert!(!advances_cursor(Some("b.jpg"), "a.jpg"));
        // Byte order: uppercase sorts before lowercase.
        assert!(advances_cursor(Some("Z.jpg"), "a.jpg"));
    }
}
