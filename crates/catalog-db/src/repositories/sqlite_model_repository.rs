//! `SQLite` implementation of the `ModelRepository` trait.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use catalog_core::{ListOptions, Model, ModelRepository, Page, RepositoryError};

use super::row_mappers::{
    finish_page, format_datetime, map_sqlx_error, page_bounds, parse_datetime,
    properties_from_json, properties_to_json,
};

/// Shared SELECT column list for model queries.
const MODEL_SELECT_COLUMNS: &str =
    "id, source_id, name, external_id, description, properties, create_time, update_time";

/// Parse a database row into a Model.
fn row_to_model(row: &sqlx::sqlite::SqliteRow) -> Result<Model, RepositoryError> {
    let get_err = |e: sqlx::Error| RepositoryError::Storage(e.to_string());

    let properties_json: String = row.try_get("properties").map_err(get_err)?;
    let create_time: String = row.try_get("create_time").map_err(get_err)?;
    let update_time: String = row.try_get("update_time").map_err(get_err)?;

    Ok(Model {
        id: Some(row.try_get::<i64, _>("id").map_err(get_err)?),
        name: row.try_get("name").map_err(get_err)?,
        external_id: row.try_get("external_id").map_err(get_err)?,
        description: row.try_get("description").map_err(get_err)?,
        create_time: Some(parse_datetime(&create_time)),
        update_time: Some(parse_datetime(&update_time)),
        properties: properties_from_json(&properties_json)?,
    })
}

/// `SQLite` implementation of the `ModelRepository` trait.
///
/// Models are keyed by (`source_id`, `name`); `save` without an id is an
/// upsert on that pair.
pub struct SqliteModelRepository {
    pool: SqlitePool,
}

impl SqliteModelRepository {
    /// Create a new `SQLite` model repository.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ModelRepository for SqliteModelRepository {
    async fn save(&self, model: &Model) -> Result<Model, RepositoryError> {
        let source_id = model.source_id().ok_or_else(|| {
            RepositoryError::Invalid(format!("Model '{}' has no source id", model.name))
        })?;
        if model.name.trim().is_empty() {
            return Err(RepositoryError::Invalid("Model name cannot be empty".to_string()));
        }

        let properties_json = properties_to_json(&model.properties)?;
        let now = format_datetime(Utc::now());
        let create_time = model.create_time.map_or_else(|| now.clone(), format_datetime);

        let id = if let Some(id) = model.id {
            let result = sqlx::query(
                r#"
                UPDATE catalog_models
                SET source_id = ?, name = ?, external_id = ?, description = ?, properties = ?, update_time = ?
                WHERE id = ?
                "#,
            )
            .bind(source_id)
            .bind(&model.name)
            .bind(&model.external_id)
            .bind(&model.description)
            .bind(&properties_json)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

            if result.rows_affected() == 0 {
                return Err(RepositoryError::NotFound(format!("Model with ID {id}")));
            }
            id
        } else {
            // Use UPSERT so repeated loads of the same source are idempotent
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO catalog_models (source_id, name, external_id, description, properties, create_time, update_time)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(source_id, name) DO UPDATE SET
                    external_id = excluded.external_id,
                    description = excluded.description,
                    properties = excluded.properties,
                    update_time = excluded.update_time
                RETURNING id
                "#,
            )
            .bind(source_id)
            .bind(&model.name)
            .bind(&model.external_id)
            .bind(&model.description)
            .bind(&properties_json)
            .bind(&create_time)
            .bind(&now)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?
        };

        self.get_by_id(id).await
    }

    async fn list(&self, options: &ListOptions) -> Result<Page<Model>, RepositoryError> {
        let (after_id, limit) = page_bounds(options.page_size, options.page_token.as_deref())?;

        let query = format!(
            "SELECT {MODEL_SELECT_COLUMNS} FROM catalog_models
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

        let models = rows.iter().map(row_to_model).collect::<Result<Vec<_>, _>>()?;
        let (items, next_page_token) = finish_page(models, options.page_size, |m| m.id);

        Ok(Page {
            items,
            next_page_token,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Model, RepositoryError> {
        let query = format!("SELECT {MODEL_SELECT_COLUMNS} FROM catalog_models WHERE id = ?");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| RepositoryError::NotFound(format!("Model with ID {id}")))?;

        row_to_model(&row)
    }

    async fn get_by_name(&self, source_id: &str, name: &str) -> Result<Model, RepositoryError> {
        let query = format!(
            "SELECT {MODEL_SELECT_COLUMNS} FROM catalog_models WHERE source_id = ? AND name = ?"
        );

        let row = sqlx::query(&query)
            .bind(source_id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or_else(|| {
                RepositoryError::NotFound(format!("Model '{name}' in source '{source_id}'"))
            })?;

        row_to_model(&row)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM catalog_models WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Model with ID {id}")));
        }

        Ok(())
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM catalog_models WHERE source_id = ?")
            .bind(source_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn distinct_source_ids(&self) -> Result<Vec<String>, RepositoryError> {
        sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT source_id FROM catalog_models ORDER BY source_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)
    }
}
