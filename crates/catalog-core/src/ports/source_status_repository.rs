//! Source status repository trait.
//!
//! Status records are shared by every catalog kind, keyed by source id.

use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::SourceStatus;

/// Repository for per-source load status.
#[async_trait]
pub trait SourceStatusRepository: Send + Sync {
    /// All persisted statuses, ordered by source id.
    async fn get_all(&self) -> Result<Vec<SourceStatus>, RepositoryError>;

    /// Status of one source.
    ///
    /// Returns `Err(RepositoryError::NotFound)` if none is recorded.
    async fn get_by_source_id(&self, source_id: &str) -> Result<SourceStatus, RepositoryError>;

    /// Insert or replace the status of `status.source_id`.
    async fn save(&self, status: &SourceStatus) -> Result<(), RepositoryError>;

    /// Delete the status of a source. Deleting a missing status is not an error.
    async fn delete(&self, source_id: &str) -> Result<(), RepositoryError>;
}
