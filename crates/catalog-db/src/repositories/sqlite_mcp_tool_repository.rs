//! `SQLite` implementation of the `McpToolRepository` trait.

use async_trait::async_trait;
use sqlx::{Row, SqliteConnection, SqlitePool};

use catalog_core::{McpServer, McpServerTool, McpToolRepository, RepositoryError, ServerIdentity};

use super::row_mappers::{map_sqlx_error, properties_from_json, properties_to_json};

fn row_to_tool(row: &sqlx::sqlite::SqliteRow) -> Result<McpServerTool, RepositoryError> {
    let get_err = |e: sqlx::Error| RepositoryError::Storage(e.to_string());

    let properties_json: String = row.try_get("properties").map_err(get_err)?;
    let input_schema: Option<String> = row.try_get("input_schema").map_err(get_err)?;

    Ok(McpServerTool {
        id: Some(row.try_get::<i64, _>("id").map_err(get_err)?),
        name: row.try_get("tool_name").map_err(get_err)?,
        description: row.try_get("description").map_err(get_err)?,
        input_schema: input_schema
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
        properties: properties_from_json(&properties_json)?,
    })
}

/// `SQLite` implementation of the `McpToolRepository` trait.
///
/// The stored `name` column holds the qualified `<composite>:<tool>` form;
/// the unqualified tool name is kept alongside for reads.
pub struct SqliteMcpToolRepository {
    pool: SqlitePool,
}

impl SqliteMcpToolRepository {
    /// Create a new `SQLite` MCP tool repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Insert one tool row under `parent_id`. Returns the new row id.
pub(super) async fn insert_tool(
    conn: &mut SqliteConnection,
    parent_id: i64,
    parent: &ServerIdentity,
    tool: &McpServerTool,
) -> Result<i64, RepositoryError> {
    let qualified = parent.qualified_tool_name(&tool.name);
    let input_schema = tool
        .input_schema
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| RepositoryError::Serialization(e.to_string()))?;
    let properties_json = properties_to_json(&tool.properties)?;

    let result = sqlx::query(
        r#"
        INSERT INTO mcp_server_tools (server_id, name, tool_name, description, input_schema, properties)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(parent_id)
    .bind(&qualified)
    .bind(&tool.name)
    .bind(&tool.description)
    .bind(&input_schema)
    .bind(&properties_json)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    Ok(result.last_insert_rowid())
}

pub(super) async fn delete_tools_of(
    conn: &mut SqliteConnection,
    parent_id: i64,
) -> Result<u64, RepositoryError> {
    let result = sqlx::query("DELETE FROM mcp_server_tools WHERE server_id = ?")
        .bind(parent_id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    Ok(result.rows_affected())
}

#[async_trait]
impl McpToolRepository for SqliteMcpToolRepository {
    async fn save(
        &self,
        parent: &McpServer,
        tool: &McpServerTool,
    ) -> Result<McpServerTool, RepositoryError> {
        let parent_id = parent.id.ok_or_else(|| {
            RepositoryError::Invalid(format!(
                "Tool '{}' saved under an unpersisted server",
                tool.name
            ))
        })?;
        let identity = parent.identity()?;

        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        let id = insert_tool(&mut conn, parent_id, &identity, tool).await?;

        let mut saved = tool.clone();
        saved.id = Some(id);
        Ok(saved)
    }

    async fn list_by_parent_id(
        &self,
        parent_id: i64,
    ) -> Result<Vec<McpServerTool>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, tool_name, description, input_schema, properties
             FROM mcp_server_tools WHERE server_id = ? ORDER BY id",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_tool).collect()
    }

    async fn delete_by_parent_id(&self, parent_id: i64) -> Result<u64, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        delete_tools_of(&mut conn, parent_id).await
    }
}
