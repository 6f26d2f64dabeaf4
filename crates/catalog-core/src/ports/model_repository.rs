//! Model repository trait definition.
//!
//! This port defines the interface for catalog model persistence.
//! Implementations must handle all storage details internally.

use async_trait::async_trait;

use super::{ListOptions, Page, RepositoryError};
use crate::domain::Model;

/// Repository for catalog model persistence operations.
///
/// # Design Rules
///
/// - No `sqlx` types in signatures
/// - Storage identity is (`source_id`, `name`); `save` is an upsert on it
/// - `source_id` is taken from the model's stamped property
#[async_trait]
pub trait ModelRepository: Send + Sync {
    /// Insert or update a model.
    ///
    /// Returns the persisted model with its assigned ID and timestamps.
    /// Returns `Err(RepositoryError::Invalid)` if the model has no source id.
    async fn save(&self, model: &Model) -> Result<Model, RepositoryError>;

    /// List models, optionally filtered by source and paged.
    async fn list(&self, options: &ListOptions) -> Result<Page<Model>, RepositoryError>;

    /// Get a model by its database ID.
    ///
    /// Returns `Err(RepositoryError::NotFound)` if the model doesn't exist.
    async fn get_by_id(&self, id: i64) -> Result<Model, RepositoryError>;

    /// Get a model by source and name.
    ///
    /// Returns `Err(RepositoryError::NotFound)` if no such model exists.
    async fn get_by_name(&self, source_id: &str, name: &str) -> Result<Model, RepositoryError>;

    /// Delete a model by its database ID.
    ///
    /// Returns `Err(RepositoryError::NotFound)` if the model doesn't exist.
    async fn delete_by_id(&self, id: i64) -> Result<(), RepositoryError>;

    /// Delete every model stamped with `source_id`. Returns the number deleted.
    async fn delete_by_source(&self, source_id: &str) -> Result<u64, RepositoryError>;

    /// All distinct source ids present in storage.
    async fn distinct_source_ids(&self) -> Result<Vec<String>, RepositoryError>;
}
