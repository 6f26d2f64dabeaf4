use std::sync::Arc;

use async_trait::async_trait;
use catalog_core::{
    ListOptions, McpServer, McpServerRecord, McpServerRepository, McpToolRepository, Repos,
    RepositoryError,
};
use crate::config::SourceKind;

use super::{CatalogKind, LIST_PAGE_SIZE, StoredEntity};

/// MCP servers and their tools, tracked by composite name.
///
/// Tools are owned by their server: every save replaces the full tool list
/// together with the server row, and deletes remove tools before the server.
#[derive(Clone)]
pub struct McpKind {
    servers: Arc<dyn McpServerRepository>,
    tools: Arc<dyn McpToolRepository>,
}

impl McpKind {
    pub fn new(servers: Arc<dyn McpServerRepository>, tools: Arc<dyn McpToolRepository>) -> Self {
        Self { servers, tools }
    }

    pub fn from_repos(repos: &Repos) -> Self {
        Self::new(Arc::clone(&repos.mcp_servers), Arc::clone(&repos.mcp_tools))
    }

    async fn list_servers(&self, source_id: &str) -> Result<Vec<McpServer>, RepositoryError> {
        let mut options = ListOptions {
            page_size: Some(LIST_PAGE_SIZE),
            ..ListOptions::for_source(source_id)
        };
        let mut servers = Vec::new();
        loop {
            let page = self.servers.list(&options).await?;
            servers.extend(page.items);
            match page.next_page_token {
                Some(token) => options.page_token = Some(token),
                None => return Ok(servers),
            }
        }
    }
}

/// Composite name, falling back to the raw parts for invalid identities so
/// that failures can still be reported by name.
fn composite_or_raw(server: &McpServer) -> String {
    server.composite_name().unwrap_or_else(|_| {
        if server.version.is_empty() {
            server.base_name.clone()
        } else {
            format!("{}@{}", server.base_name, server.version)
        }
    })
}

#[async_trait]
impl CatalogKind for McpKind {
    type Entity = McpServerRecord;

    const SOURCE_KIND: SourceKind = SourceKind::Mcp;

    fn logical_name(entity: &McpServerRecord) -> String {
        composite_or_raw(&entity.server)
    }

    fn stamp_source(entity: &mut McpServerRecord, source_id: &str) {
        entity.server.set_source_id(source_id);
    }

    async fn save(&self, entity: &McpServerRecord) -> Result<(), RepositoryError> {
        self.servers.save_with_tools(entity).await?;
        Ok(())
    }

    async fn list_by_source(&self, source_id: &str) -> Result<Vec<StoredEntity>, RepositoryError> {
        Ok(self
            .list_servers(source_id)
            .await?
            .into_iter()
            .filter_map(|server| {
                server.id.map(|id| StoredEntity {
                    id,
                    name: composite_or_raw(&server),
                })
            })
            .collect())
    }

    async fn delete_entity(&self, id: i64) -> Result<(), RepositoryError> {
        self.tools.delete_by_parent_id(id).await?;
        self.servers.delete_by_id(id).await
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<u64, RepositoryError> {
        for server in self.list_servers(source_id).await? {
            if let Some(id) = server.id {
                self.tools.delete_by_parent_id(id).await?;
            }
        }
        self.servers.delete_by_source(source_id).await
    }

    async fn distinct_source_ids(&self) -> Result<Vec<String>, RepositoryError> {
        self.servers.distinct_source_ids().await
    }
}
