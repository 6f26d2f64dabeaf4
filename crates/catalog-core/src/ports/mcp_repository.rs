//! MCP server and tool repository traits.

use async_trait::async_trait;

use super::{ListOptions, Page, RepositoryError};
use crate::domain::{McpServer, McpServerRecord, McpServerTool};

/// Repository trait for MCP server persistence.
///
/// # Design Rules
///
/// - Storage identity is the composite name `base_name@version`
/// - `save()` validates identity before touching storage and resolves
///   concurrent first-insert races itself
/// - Deleting a server does not delete its tools; callers remove children
///   first through [`McpToolRepository::delete_by_parent_id`]
/// - `save_with_tools()` is atomic: a failed tool leaves storage untouched
///
/// # Example
///
/// ```ignore
/// let saved = repo.save(&McpServer::new("github", "1.0")).await?;
/// let found = repo.get_by_name_and_version("github", "1.0").await?;
/// assert_eq!(saved.id, found.id);
/// ```
#[async_trait]
pub trait McpServerRepository: Send + Sync {
    /// Insert or update a server.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentity` if base name or version fail validation
    /// - `Invalid` if the server has no source id
    /// - `Storage` for storage errors
    async fn save(&self, server: &McpServer) -> Result<McpServer, RepositoryError>;

    /// Upsert a server and replace its whole tool list as one unit.
    ///
    /// Either the server and every tool are stored, or nothing changes.
    ///
    /// # Errors
    ///
    /// As [`save`](Self::save), plus `Constraint` when two tools share a name.
    async fn save_with_tools(&self, record: &McpServerRecord)
    -> Result<McpServer, RepositoryError>;

    /// List servers, optionally filtered by source and paged.
    async fn list(&self, options: &ListOptions) -> Result<Page<McpServer>, RepositoryError>;

    /// Get a server by its database ID.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no server with the given ID exists
    async fn get_by_id(&self, id: i64) -> Result<McpServer, RepositoryError>;

    /// Get a server by its identity parts.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentity` if the parts fail validation
    /// - `NotFound` if no such server exists
    async fn get_by_name_and_version(
        &self,
        base_name: &str,
        version: &str,
    ) -> Result<McpServer, RepositoryError>;

    /// Delete a server by its database ID.
    ///
    /// # Errors
    ///
    /// - `NotFound` if no server with the given ID exists
    async fn delete_by_id(&self, id: i64) -> Result<(), RepositoryError>;

    /// Delete every server stamped with `source_id`. Returns the number deleted.
    async fn delete_by_source(&self, source_id: &str) -> Result<u64, RepositoryError>;

    /// All distinct source ids present in storage.
    async fn distinct_source_ids(&self) -> Result<Vec<String>, RepositoryError>;
}

/// Repository trait for MCP tools, the child rows of a server.
#[async_trait]
pub trait McpToolRepository: Send + Sync {
    /// Insert a tool under `parent`, stored as `<composite>:<tool>`.
    ///
    /// `parent` must already be persisted.
    async fn save(
        &self,
        parent: &McpServer,
        tool: &McpServerTool,
    ) -> Result<McpServerTool, RepositoryError>;

    /// All tools of a server, in insertion order.
    async fn list_by_parent_id(
        &self,
        parent_id: i64,
    ) -> Result<Vec<McpServerTool>, RepositoryError>;

    /// Delete every tool of a server. Returns the number deleted.
    async fn delete_by_parent_id(&self, parent_id: i64) -> Result<u64, RepositoryError>;
}
