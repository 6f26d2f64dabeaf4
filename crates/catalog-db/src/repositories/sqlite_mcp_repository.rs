//! `SQLite` implementation of the `McpServerRepository` trait.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqliteConnection, SqlitePool};

use catalog_core::{
    ListOptions, McpServer, McpServerRecord, McpServerRepository, Page, RepositoryError,
    ServerIdentity,
};

use super::row_mappers::{
    finish_page, format_datetime, is_unique_violation, map_sqlx_error, page_bounds,
    parse_datetime, properties_from_json, properties_to_json,
};
use super::sqlite_mcp_tool_repository::{delete_tools_of, insert_tool};

/// Shared SELECT column list for server queries.
const SERVER_SELECT_COLUMNS: &str = "id, base_name, version, external_id, description, \
                                     properties, create_time, update_time";

/// Parse a database row into an `McpServer`.
fn row_to_server(row: &sqlx::sqlite::SqliteRow) -> Result<McpServer, RepositoryError> {
    let get_err = |e: sqlx::Error| RepositoryError::Storage(e.to_string());

    let properties_json: String = row.try_get("properties").map_err(get_err)?;
    let create_time: String = row.try_get("create_time").map_err(get_err)?;
    let update_time: String = row.try_get("update_time").map_err(get_err)?;

    Ok(McpServer {
        id: Some(row.try_get::<i64, _>("id").map_err(get_err)?),
        base_name: row.try_get("base_name").map_err(get_err)?,
        version: row.try_get("version").map_err(get_err)?,
        external_id: row.try_get("external_id").map_err(get_err)?,
        description: row.try_get("description").map_err(get_err)?,
        create_time: Some(parse_datetime(&create_time)),
        update_time: Some(parse_datetime(&update_time)),
        properties: properties_from_json(&properties_json)?,
    })
}

/// `SQLite` implementation of the `McpServerRepository` trait.
///
/// Rows are unique on the composite name. Two writers inserting the same
/// identity concurrently both succeed: the loser of the insert race sees the
/// unique violation, re-resolves the winner's row and updates it instead.
pub struct SqliteMcpRepository {
    pool: SqlitePool,
}

impl SqliteMcpRepository {
    /// Create a new `SQLite` MCP server repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

async fn find_id_by_composite(
    conn: &mut SqliteConnection,
    composite: &str,
) -> Result<Option<i64>, RepositoryError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM mcp_servers WHERE name = ?")
        .bind(composite)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)
}

async fn insert(
    conn: &mut SqliteConnection,
    identity: &ServerIdentity,
    source_id: &str,
    server: &McpServer,
    properties_json: &str,
) -> Result<i64, sqlx::Error> {
    let now = format_datetime(Utc::now());
    let create_time = server.create_time.map_or_else(|| now.clone(), format_datetime);

    let result = sqlx::query(
        r#"
        INSERT INTO mcp_servers (name, base_name, version, source_id, external_id, description, properties, create_time, update_time)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(identity.composite())
    .bind(identity.base_name())
    .bind(identity.version())
    .bind(source_id)
    .bind(&server.external_id)
    .bind(&server.description)
    .bind(properties_json)
    .bind(&create_time)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

async fn update(
    conn: &mut SqliteConnection,
    id: i64,
    identity: &ServerIdentity,
    source_id: &str,
    server: &McpServer,
    properties_json: &str,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r#"
        UPDATE mcp_servers
        SET name = ?, base_name = ?, version = ?, source_id = ?, external_id = ?,
            description = ?, properties = ?, update_time = ?
        WHERE id = ?
        "#,
    )
    .bind(identity.composite())
    .bind(identity.base_name())
    .bind(identity.version())
    .bind(source_id)
    .bind(&server.external_id)
    .bind(&server.description)
    .bind(properties_json)
    .bind(format_datetime(Utc::now()))
    .bind(id)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound(format!("MCP server with ID {id}")));
    }

    Ok(())
}

/// Insert or update `server` on `conn` and return its row id.
///
/// Identity is validated before any statement runs.
async fn upsert(conn: &mut SqliteConnection, server: &McpServer) -> Result<i64, RepositoryError> {
    let identity = server.identity()?;
    let source_id = server.source_id().ok_or_else(|| {
        RepositoryError::Invalid(format!(
            "MCP server '{}' has no source id",
            identity.composite()
        ))
    })?;
    let properties_json = properties_to_json(&server.properties)?;
    let composite = identity.composite();

    let existing = match server.id {
        Some(id) => Some(id),
        None => find_id_by_composite(conn, &composite).await?,
    };

    if let Some(id) = existing {
        update(conn, id, &identity, source_id, server, &properties_json).await?;
        return Ok(id);
    }

    match insert(conn, &identity, source_id, server, &properties_json).await {
        Ok(id) => Ok(id),
        Err(e) if is_unique_violation(&e) => {
            // Lost the insert race; the row now exists, update it once.
            let id = find_id_by_composite(conn, &composite).await?.ok_or_else(|| {
                RepositoryError::Constraint(format!(
                    "MCP server '{composite}' conflicted but could not be re-read"
                ))
            })?;
            tracing::debug!(
                server = %composite,
                id,
                "Concurrent insert detected, updating existing row"
            );
            update(conn, id, &identity, source_id, server, &properties_json).await?;
            Ok(id)
        }
        Err(e) => Err(map_sqlx_error(e)),
    }
}

/// Upsert the server and swap in its tools. Returns the server id and the
/// number of tools removed.
async fn replace_record(
    conn: &mut SqliteConnection,
    identity: &ServerIdentity,
    record: &McpServerRecord,
) -> Result<(i64, u64), RepositoryError> {
    let id = upsert(conn, &record.server).await?;
    let removed = delete_tools_of(conn, id).await?;
    for tool in &record.tools {
        insert_tool(conn, id, identity, tool).await?;
    }
    Ok((id, removed))
}

#[async_trait]
impl McpServerRepository for SqliteMcpRepository {
    async fn save(&self, server: &McpServer) -> Result<McpServer, RepositoryError> {
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        let id = upsert(&mut conn, server).await?;
        drop(conn);

        self.get_by_id(id).await
    }

    async fn save_with_tools(
        &self,
        record: &McpServerRecord,
    ) -> Result<McpServer, RepositoryError> {
        let identity = record.server.identity()?;
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let (id, removed) = match replace_record(&mut tx, &identity, record).await {
            Ok(done) => done,
            Err(e) => {
                tx.rollback().await.map_err(map_sqlx_error)?;
                return Err(e);
            }
        };
        tx.commit().await.map_err(map_sqlx_error)?;

        tracing::debug!(
            server = %identity.composite(),
            removed,
            saved = record.tools.len(),
            "Replaced MCP server tools"
        );
        self.get_by_id(id).await
    }

    async fn list(&self, options: &ListOptions) -> Result<Page<McpServer>, RepositoryError> {
        let (after_id, limit) = page_bounds(options.page_size, options.page_token.as_deref())?;

        let query = format!(
            "SELECT {SERVER_SELECT_COLUMNS} FROM mcp_servers
             WHERE (?1 IS NULL OR source_id = ?1) AND id > ?2
             ORDER BY id LIMIT ?3"
        );

        let rows = sqlx::query(&query)
            .bind(&options.source_id)
            .bind(after_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let servers = rows
            .iter()
            .map(row_to_server)
            .collect::<Result<Vec<_>, _>>()?;
        let (items, next_page_token) = finish_page(servers, options.page_size, |s| s.id);

        Ok(Page {
            items,
            next_page_token,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<McpServer, RepositoryError> {
        let query = format!("SELECT {SERVER_SELECT_COLUMNS} FROM mcp_servers WHERE id = ?");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| RepositoryError::NotFound(format!("MCP server with ID {id}")))?;

        row_to_server(&row)
    }

    async fn get_by_name_and_version(
        &self,
        base_name: &str,
        version: &str,
    ) -> Result<McpServer, RepositoryError> {
        let composite = ServerIdentity::new(base_name, version)?.composite();
        let query = format!("SELECT {SERVER_SELECT_COLUMNS} FROM mcp_servers WHERE name = ?");

        let row = sqlx::query(&query)
            .bind(&composite)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| RepositoryError::NotFound(format!("MCP server '{composite}'")))?;

        row_to_server(&row)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM mcp_servers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("MCP server with ID {id}")));
        }

        Ok(())
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM mcp_servers WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn distinct_source_ids(&self) -> Result<Vec<String>, RepositoryError> {
        sqlx::query_scalar::<_, String>("SELECT DISTINCT source_id FROM mcp_servers ORDER BY source_id")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::{setup_database, setup_test_database};
    use catalog_core::{IdentityError, McpServerTool};
    use std::sync::Arc;

    fn server(source: &str, base: &str, version: &str) -> McpServer {
        let mut s = McpServer::new(base, version).with_description(format!("{base} server"));
        s.set_source_id(source);
        s
    }

    #[tokio::test]
    async fn test_save_and_get_by_identity() {
        let repo = SqliteMcpRepository::new(setup_test_database().await.unwrap());

        let saved = repo.save(&server("mcp", "github", "1.0")).await.unwrap();
        let found = repo.get_by_name_and_version("github", "1.0").await.unwrap();

        assert_eq!(saved.id, found.id);
        assert_eq!(found.base_name, "github");
        assert_eq!(found.version, "1.0");
        assert_eq!(found.source_id(), Some("mcp"));
    }

    #[tokio::test]
    async fn test_versions_are_distinct_rows() {
        let repo = SqliteMcpRepository::new(setup_test_database().await.unwrap());

        let v1 = repo.save(&server("mcp", "github", "1.0")).await.unwrap();
        let v2 = repo.save(&server("mcp", "github", "2.0")).await.unwrap();
        let plain = repo.save(&server("mcp", "github", "")).await.unwrap();

        assert_ne!(v1.id, v2.id);
        assert_ne!(v1.id, plain.id);
        assert_eq!(
            repo.get_by_name_and_version("github", "").await.unwrap().id,
            plain.id
        );
    }

    #[tokio::test]
    async fn test_save_same_identity_updates() {
        let repo = SqliteMcpRepository::new(setup_test_database().await.unwrap());

        let first = repo.save(&server("a", "fs", "0.6")).await.unwrap();
        let second = repo
            .save(&server("b", "fs", "0.6").with_description("moved"))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.source_id(), Some("b"));
        assert_eq!(second.description.as_deref(), Some("moved"));
    }

    #[tokio::test]
    async fn test_invalid_identity_is_rejected_before_storage() {
        let repo = SqliteMcpRepository::new(setup_test_database().await.unwrap());

        let result = repo.save(&server("mcp", "git@hub", "1.0")).await;
        assert!(matches!(
            result,
            Err(RepositoryError::InvalidIdentity(
                IdentityError::BaseNameContainsSeparator(_)
            ))
        ));

        let result = repo.get_by_name_and_version("", "1.0").await;
        assert!(matches!(
            result,
            Err(RepositoryError::InvalidIdentity(IdentityError::EmptyBaseName))
        ));

        assert!(repo.list(&ListOptions::default()).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_first_insert_yields_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let pool = setup_database(&dir.path().join("race.db")).await.unwrap();
        let repo = Arc::new(SqliteMcpRepository::new(pool));

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.save(&server("mcp", "racer", "1.0").with_description(format!("writer {i}")))
                    .await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }

        ids.dedup();
        assert_eq!(ids.len(), 1);
        assert_eq!(repo.list(&ListOptions::default()).await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_source_and_distinct_ids() {
        let repo = SqliteMcpRepository::new(setup_test_database().await.unwrap());
        repo.save(&server("a", "one", "")).await.unwrap();
        repo.save(&server("b", "two", "")).await.unwrap();
        repo.save(&server("b", "three", "")).await.unwrap();

        assert_eq!(
            repo.distinct_source_ids().await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(repo.delete_by_source("b").await.unwrap(), 2);
        assert_eq!(repo.distinct_source_ids().await.unwrap(), vec!["a".to_string()]);
    }

    fn record(source: &str, base: &str, version: &str, tools: &[&str]) -> McpServerRecord {
        McpServerRecord::new(
            server(source, base, version),
            tools.iter().map(|t| McpServerTool::new(*t)).collect(),
        )
    }

    async fn tool_names(pool: &SqlitePool, server_id: i64) -> Vec<String> {
        sqlx::query_scalar("SELECT tool_name FROM mcp_server_tools WHERE server_id = ? ORDER BY id")
            .bind(server_id)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_with_tools_replaces_tool_list() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteMcpRepository::new(pool.clone());

        let first = repo
            .save_with_tools(&record("mcp", "github", "1.0", &["a", "b"]))
            .await
            .unwrap();
        let second = repo
            .save_with_tools(&record("mcp", "github", "1.0", &["c"]))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(tool_names(&pool, second.id.unwrap()).await, vec!["c".to_string()]);
    }

    #[tokio::test]
    async fn test_save_with_duplicate_tools_writes_nothing() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteMcpRepository::new(pool.clone());

        let result = repo
            .save_with_tools(&record("mcp", "github", "1.0", &["dup", "dup"]))
            .await;

        assert!(matches!(result, Err(RepositoryError::Constraint(_))));
        assert!(repo.list(&ListOptions::default()).await.unwrap().items.is_empty());
        let tools: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mcp_server_tools")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(tools, 0);
    }

    #[tokio::test]
    async fn test_failed_tool_replacement_keeps_previous_state() {
        let pool = setup_test_database().await.unwrap();
        let repo = SqliteMcpRepository::new(pool.clone());
        let saved = repo
            .save_with_tools(&record("mcp", "github", "1.0", &["a"]))
            .await
            .unwrap();

        let mut changed = record("other", "github", "1.0", &["x", "x"]);
        changed.server.description = Some("changed".to_string());
        assert!(repo.save_with_tools(&changed).await.is_err());

        let stored = repo.get_by_id(saved.id.unwrap()).await.unwrap();
        assert_eq!(stored.source_id(), Some("mcp"));
        assert_eq!(stored.description.as_deref(), Some("github server"));
        assert_eq!(tool_names(&pool, saved.id.unwrap()).await, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_by_id_not_found() {
        let repo = SqliteMcpRepository::new(setup_test_database().await.unwrap());

        assert!(matches!(
            repo.delete_by_id(42).await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
