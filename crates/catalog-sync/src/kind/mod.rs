//! Catalog kinds.
//!
//! A [`CatalogKind`] bundles everything the loader needs to know about one
//! entity type: how to name it, how to tag it with its source, and how to
//! store and remove it. The loader itself is written once over this trait.

mod mcp;
mod model;

use async_trait::async_trait;
use catalog_core::RepositoryError;
use tokio_util::sync::CancellationToken;

use crate::config::SourceKind;

pub use mcp::McpKind;
pub use model::ModelKind;

/// Page size used when listing a source's stored entities.
pub(crate) const LIST_PAGE_SIZE: u32 = 500;

/// Minimal view of a stored entity, as needed by the orphan sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntity {
    pub id: i64,
    /// Logical name, comparable with [`CatalogKind::logical_name`].
    pub name: String,
}

/// Storage operations and naming rules for one catalog entity type.
#[async_trait]
pub trait CatalogKind: Send + Sync + 'static {
    /// What providers of this kind emit.
    type Entity: Clone + Send + Sync + 'static;

    /// Which source lists of a config file feed this kind.
    const SOURCE_KIND: SourceKind;

    /// Name the entity is tracked by within its source.
    fn logical_name(entity: &Self::Entity) -> String;

    /// Tag the entity with the id of the source that produced it.
    fn stamp_source(entity: &mut Self::Entity, source_id: &str);

    /// Persist the entity, including any children.
    async fn save(&self, entity: &Self::Entity) -> Result<(), RepositoryError>;

    /// Every stored entity tagged with `source_id`.
    async fn list_by_source(&self, source_id: &str) -> Result<Vec<StoredEntity>, RepositoryError>;

    /// Delete one entity, children first.
    async fn delete_entity(&self, id: i64) -> Result<(), RepositoryError>;

    /// Delete everything tagged with `source_id`, children first.
    async fn delete_by_source(&self, source_id: &str) -> Result<u64, RepositoryError>;

    /// Source ids present in storage.
    async fn distinct_source_ids(&self) -> Result<Vec<String>, RepositoryError>;
}

/// Hook invoked once per successfully persisted record.
///
/// Errors are logged by the loader and never abort the pass.
#[async_trait]
pub trait RecordHandler<E: Send + Sync>: Send + Sync {
    async fn handle(&self, cancel: &CancellationToken, record: &E) -> anyhow::Result<()>;
}
