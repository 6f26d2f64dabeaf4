//! `SQLite` implementation of the `SourceStatusRepository` trait.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use catalog_core::{RepositoryError, SourceState, SourceStatus, SourceStatusRepository};

use super::row_mappers::{format_datetime, map_sqlx_error, parse_datetime};

fn row_to_status(row: &sqlx::sqlite::SqliteRow) -> Result<SourceStatus, RepositoryError> {
    let get_err = |e: sqlx::Error| RepositoryError::Storage(e.to_string());

    let state: String = row.try_get("state").map_err(get_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(get_err)?;

    Ok(SourceStatus {
        source_id: row.try_get("source_id").map_err(get_err)?,
        state: state
            .parse::<SourceState>()
            .map_err(RepositoryError::Serialization)?,
        error: row.try_get("error").map_err(get_err)?,
        updated_at: parse_datetime(&updated_at),
    })
}

/// `SQLite` implementation of the `SourceStatusRepository` trait.
pub struct SqliteSourceStatusRepository {
    pool: SqlitePool,
}

impl SqliteSourceStatusRepository {
    /// Create a new `SQLite` source status repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SourceStatusRepository for SqliteSourceStatusRepository {
    async fn get_all(&self) -> Result<Vec<SourceStatus>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT source_id, state, error, updated_at FROM source_statuses ORDER BY source_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(row_to_status).collect()
    }

    async fn get_by_source_id(&self, source_id: &str) -> Result<SourceStatus, RepositoryError> {
        let row = sqlx::query(
            "SELECT source_id, state, error, updated_at FROM source_statuses WHERE source_id = ?",
        )
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or_else(|| RepositoryError::NotFound(format!("Status of source '{source_id}'")))?;

        row_to_status(&row)
    }

    async fn save(&self, status: &SourceStatus) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO source_statuses (source_id, state, error, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                state = excluded.state,
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&status.source_id)
        .bind(status.state.as_str())
        .bind(&status.error)
        .bind(format_datetime(status.updated_at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn delete(&self, source_id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM source_statuses WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::setup_test_database;

    #[tokio::test]
    async fn test_save_replaces_previous_status() {
        let repo = SqliteSourceStatusRepository::new(setup_test_database().await.unwrap());

        repo.save(&SourceStatus::error("hf", "boom")).await.unwrap();
        repo.save(&SourceStatus::available("hf")).await.unwrap();

        let status = repo.get_by_source_id("hf").await.unwrap();
        assert_eq!(status.state, SourceState::Available);
        assert!(status.error.is_none());
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let repo = SqliteSourceStatusRepository::new(setup_test_database().await.unwrap());

        assert!(matches!(
            repo.get_by_source_id("nope").await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let repo = SqliteSourceStatusRepository::new(setup_test_database().await.unwrap());
        repo.save(&SourceStatus::disabled("old")).await.unwrap();

        repo.delete("old").await.unwrap();
        repo.delete("old").await.unwrap();

        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_all_orders_by_source() {
        let repo = SqliteSourceStatusRepository::new(setup_test_database().await.unwrap());
        repo.save(&SourceStatus::available("b")).await.unwrap();
        repo.save(&SourceStatus::partially_available("a", "1 of 3 failed"))
            .await
            .unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all[0].source_id, "a");
        assert_eq!(all[0].state, SourceState::PartiallyAvailable);
        assert_eq!(all[0].error.as_deref(), Some("1 of 3 failed"));
    }
}
