use std::sync::Arc;

use async_trait::async_trait;
use catalog_core::{ListOptions, Model, ModelRepository, Repos, RepositoryError};

use crate::config::SourceKind;

use super::{CatalogKind, LIST_PAGE_SIZE, StoredEntity};

/// Models, tracked by name within their source.
#[derive(Clone)]
pub struct ModelKind {
    models: Arc<dyn ModelRepository>,
}

impl ModelKind {
    pub fn new(models: Arc<dyn ModelRepository>) -> Self {
        Self { models }
    }

    pub fn from_repos(repos: &Repos) -> Self {
        Self::new(Arc::clone(&repos.models))
    }
}

#[async_trait]
impl CatalogKind for ModelKind {
    type Entity = Model;

    const SOURCE_KIND: SourceKind = SourceKind::Model;

    fn logical_name(entity: &Model) -> String {
        entity.name.clone()
    }

    fn stamp_source(entity: &mut Model, source_id: &str) {
        entity.set_source_id(source_id);
    }

    async fn save(&self, entity: &Model) -> Result<(), RepositoryError> {
        self.models.save(entity).await.map(|_| ())
    }

    async fn list_by_source(&self, source_id: &str) -> Result<Vec<StoredEntity>, RepositoryError> {
        let mut options = ListOptions {
            page_size: Some(LIST_PAGE_SIZE),
            ..ListOptions::for_source(source_id)
        };
        let mut stored = Vec::new();
        loop {
            let page = self.models.list(&options).await?;
            stored.extend(page.items.into_iter().filter_map(|model| {
                model.id.map(|id| StoredEntity {
                    id,
                    name: model.name,
                })
            }));
            match page.next_page_token {
                Some(token) => options.page_token = Some(token),
                None => return Ok(stored),
            }
        }
    }

    async fn delete_entity(&self, id: i64) -> Result<(), RepositoryError> {
        self.models.delete_by_id(id).await
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<u64, RepositoryError> {
        self.models.delete_by_source(source_id).await
    }

    async fn distinct_source_ids(&self) -> Result<Vec<String>, RepositoryError> {
        self.models.distinct_source_ids().await
    }
}
