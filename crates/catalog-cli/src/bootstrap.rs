//! CLI bootstrap - the composition root.
//!
//! Opens the database, registers the built-in providers into the
//! process-wide registries and builds the [`CatalogSync`] supervisor.

use std::path::Path;

use anyhow::{Context, Result};
use catalog_core::Repos;
use catalog_db::CoreFactory;
use catalog_sync::{
    CatalogSync, SyncOptions, mcp_providers, model_providers, register_builtin_providers,
};
use tracing::debug;

use crate::commands::RunArgs;

/// Open (or create) the catalog database and build its repositories.
pub async fn open_repos(db: &Path) -> Result<Repos> {
    let pool = CoreFactory::create_pool(db)
        .await
        .with_context(|| format!("Failed to open catalog database {}", db.display()))?;
    debug!(path = %db.display(), "Opened catalog database");
    Ok(CoreFactory::build_repos(pool))
}

/// Register the built-in provider types.
pub fn register_providers() -> Result<()> {
    register_builtin_providers().context("Failed to register built-in providers")
}

/// Compose the supervisor for `run`.
pub async fn build_sync(args: &RunArgs) -> Result<CatalogSync> {
    register_providers()?;
    let repos = open_repos(&args.db).await?;
    Ok(CatalogSync::from_repos(
        &repos,
        model_providers(),
        mcp_providers(),
        args.configs.model_config.clone(),
        args.configs.mcp_config.clone(),
    )
    .with_options(SyncOptions {
        watch_configs: args.watch,
        drain_timeout: args.drain_timeout(),
    }))
}
