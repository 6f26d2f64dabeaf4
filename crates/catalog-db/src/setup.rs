//! Database setup and initialization.
//!
//! This module provides the `setup_database()` function for initializing
//! the `SQLite` database with full schema. Entry points call this with the
//! resolved database path.

use anyhow::Result;
use sqlx::{SqlitePool, sqlite::SqliteConnectOptions};
use std::path::Path;

/// Sets up the `SQLite` database connection and ensures the schema exists.
///
/// This function:
/// 1. Establishes a connection to the `SQLite` database file
/// 2. Creates the database file if it doesn't exist
/// 3. Creates all tables and indexes
///
/// # Errors
///
/// Returns an error if:
/// - The database file cannot be opened or created
/// - Schema creation fails
///
/// # Example
///
/// ```rust,no_run
/// use catalog_db::setup_database;
/// use std::path::Path;
///
/// # async fn example() -> anyhow::Result<()> {
/// let db_path = Path::new("/var/lib/catalog/catalog.db");
/// let pool = setup_database(db_path).await?;
/// # Ok(())
/// # }
/// ```
pub async fn setup_database(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = SqlitePool::connect_with(
        SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true),
    )
    .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Sets up an in-memory `SQLite` database for testing.
///
/// Creates a fresh in-memory database with the full production schema.
#[cfg(any(test, feature = "test-utils"))]
pub async fn setup_test_database() -> Result<SqlitePool> {
    let pool = SqlitePool::connect("sqlite::memory:").await?;
    create_schema(&pool).await?;
    Ok(pool)
}

/// Creates the complete database schema.
///
/// It is safe to call multiple times as all operations use IF NOT EXISTS.
pub(crate) async fn create_schema(pool: &SqlitePool) -> Result<()> {
    // Catalog models, unique per (source_id, name)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_models (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id TEXT NOT NULL,
            name TEXT NOT NULL,
            external_id TEXT,
            description TEXT,
            properties TEXT NOT NULL DEFAULT '[]',
            create_time TEXT NOT NULL,
            update_time TEXT NOT NULL,
            UNIQUE(source_id, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_catalog_models_source ON catalog_models(source_id)",
    )
    .execute(pool)
    .await?;

    // MCP servers; `name` is the composite base_name@version
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mcp_servers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            base_name TEXT NOT NULL,
            version TEXT NOT NULL DEFAULT '',
            source_id TEXT NOT NULL,
            external_id TEXT,
            description TEXT,
            properties TEXT NOT NULL DEFAULT '[]',
            create_time TEXT NOT NULL,
            update_time TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_mcp_servers_source ON mcp_servers(source_id)")
        .execute(pool)
        .await?;

    // MCP tools; no cascade so that parents can only go once children are gone
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mcp_server_tools (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            server_id INTEGER NOT NULL,
            name TEXT NOT NULL UNIQUE,
            tool_name TEXT NOT NULL,
            description TEXT,
            input_schema TEXT,
            properties TEXT NOT NULL DEFAULT '[]',
            FOREIGN KEY (server_id) REFERENCES mcp_servers(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mcp_server_tools_server ON mcp_server_tools(server_id)",
    )
    .execute(pool)
    .await?;

    // Per-source status, shared by every catalog kind
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS source_statuses (
            source_id TEXT PRIMARY KEY NOT NULL,
            state TEXT NOT NULL CHECK (state IN ('available', 'partially-available', 'error', 'disabled')),
            error TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_setup_test_database() {
        let pool = setup_test_database().await.unwrap();

        // Verify tables exist by querying them
        for table in [
            "catalog_models",
            "mcp_servers",
            "mcp_server_tools",
            "source_statuses",
        ] {
            let _: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&pool)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_setup_database_on_disk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");

        let pool = setup_database(&path).await.unwrap();
        create_schema(&pool).await.unwrap();

        assert!(path.exists());
    }
}
