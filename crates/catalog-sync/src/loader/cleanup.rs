//! Removal of entities and statuses that configuration no longer backs.
//!
//! Listing failures abort the pass; a failed delete is logged and the sweep
//! moves on, since the next pass retries it.

use std::collections::HashSet;

use catalog_core::SourceStatusRepository;
use tracing::{debug, info, warn};

use super::writer::PassScope;
use crate::error::LoaderError;
use crate::kind::CatalogKind;
use crate::state::BaseLoaderState;

/// Delete stored entities of `source_id` that the last batch did not
/// contain. Returns how many were removed.
pub(super) async fn sweep_orphans<K: CatalogKind>(
    kind: &K,
    state: &BaseLoaderState,
    source_id: &str,
    saved: &HashSet<String>,
) -> Result<usize, LoaderError> {
    let stored = kind.list_by_source(source_id).await?;

    let mut removed = 0;
    for orphan in stored.into_iter().filter(|e| !saved.contains(&e.name)) {
        let _write = state.begin_write();
        match kind.delete_entity(orphan.id).await {
            Ok(()) => {
                debug!(source_id = %source_id, name = %orphan.name, "Removed orphan");
                removed += 1;
            }
            Err(e) => warn!(
                source_id = %source_id,
                name = %orphan.name,
                error = %e,
                "Failed to remove orphan"
            ),
        }
    }

    if removed > 0 {
        info!(source_id = %source_id, removed, "Removed orphaned entities");
    }
    Ok(removed)
}

/// Delete the entities of every stored source id that is not enabled, and
/// the status of those that are no longer configured at all.
pub(super) async fn sweep_removed_sources<K: CatalogKind>(
    kind: &K,
    state: &BaseLoaderState,
    statuses: &dyn SourceStatusRepository,
    scope: &PassScope,
) -> Result<(), LoaderError> {
    for source_id in kind.distinct_source_ids().await? {
        if scope.enabled.contains(&source_id) {
            continue;
        }

        {
            let _write = state.begin_write();
            match kind.delete_by_source(&source_id).await {
                Ok(removed) => info!(
                    kind = K::SOURCE_KIND.as_str(),
                    source_id = %source_id,
                    removed,
                    "Removed entities of inactive source"
                ),
                Err(e) => {
                    warn!(source_id = %source_id, error = %e, "Failed to remove entities of inactive source");
                    continue;
                }
            }
        }

        if !scope.configured.contains(&source_id) && !scope.all_known.contains(&source_id) {
            delete_status(state, statuses, &source_id).await;
        }
    }
    Ok(())
}

/// Delete statuses of sources that no catalog kind configures.
pub(super) async fn sweep_statuses(
    state: &BaseLoaderState,
    statuses: &dyn SourceStatusRepository,
    scope: &PassScope,
) -> Result<(), LoaderError> {
    for status in statuses.get_all().await? {
        let id = &status.source_id;
        if !scope.configured.contains(id) && !scope.all_known.contains(id) {
            delete_status(state, statuses, id).await;
        }
    }
    Ok(())
}

async fn delete_status(state: &BaseLoaderState, statuses: &dyn SourceStatusRepository, source_id: &str) {
    let _write = state.begin_write();
    match statuses.delete(source_id).await {
        Ok(()) => info!(source_id = %source_id, "Removed status of unconfigured source"),
        Err(e) => warn!(source_id = %source_id, error = %e, "Failed to remove source status"),
    }
}
