//! Composition utilities for wiring the sync engine to `SQLite` backends.
//!
//! This module is focused purely on construction and should not contain
//! any domain logic.

use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

use catalog_core::Repos;

use crate::repositories::{
    SqliteMcpRepository, SqliteMcpToolRepository, SqliteModelRepository,
    SqliteSourceStatusRepository,
};
use crate::setup::setup_database;

/// Factory for creating repository instances with `SQLite` backends.
pub struct CoreFactory;

impl CoreFactory {
    /// Open (or create) the database file and apply the schema.
    pub async fn create_pool(db_path: &Path) -> anyhow::Result<SqlitePool> {
        setup_database(db_path).await
    }

    /// Build all `SQLite` repositories from a pool.
    ///
    /// This is the recommended way for adapters to obtain repositories.
    pub fn build_repos(pool: SqlitePool) -> Repos {
        Repos::new(
            Arc::new(SqliteModelRepository::new(pool.clone())),
            Arc::new(SqliteMcpRepository::new(pool.clone())),
            Arc::new(SqliteMcpToolRepository::new(pool.clone())),
            Arc::new(SqliteSourceStatusRepository::new(pool)),
        )
    }
}

/// Test database helper for integration tests.
///
/// Provides an in-memory `SQLite` database with the production schema.
#[cfg(any(test, feature = "test-utils"))]
pub struct TestDb {
    pool: SqlitePool,
}

#[cfg(any(test, feature = "test-utils"))]
impl TestDb {
    /// Create a new in-memory test database with full schema.
    pub async fn new() -> anyhow::Result<Self> {
        let pool = crate::setup::setup_test_database().await?;
        Ok(Self { pool })
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// All repositories over this test database.
    pub fn repos(&self) -> Repos {
        CoreFactory::build_repos(self.pool.clone())
    }

    /// Create a model repository using this test database.
    pub fn model_repository(&self) -> SqliteModelRepository {
        SqliteModelRepository::new(self.pool.clone())
    }

    /// Create an MCP server repository using this test database.
    pub fn mcp_repository(&self) -> SqliteMcpRepository {
        SqliteMcpRepository::new(self.pool.clone())
    }

    /// Create an MCP tool repository using this test database.
    pub fn mcp_tool_repository(&self) -> SqliteMcpToolRepository {
        SqliteMcpToolRepository::new(self.pool.clone())
    }

    /// Create a source status repository using this test database.
    pub fn source_status_repository(&self) -> SqliteSourceStatusRepository {
        SqliteSourceStatusRepository::new(self.pool.clone())
    }
}
