//! The serial writer of a leader pass.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use catalog_core::{SourceStatus, SourceStatusRepository};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cleanup;
use crate::error::{LoaderError, PartiallyAvailableError};
use crate::kind::{CatalogKind, RecordHandler};
use crate::state::BaseLoaderState;

/// An item that did not make it into storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FailedItem {
    pub(crate) item: String,
    pub(crate) error: String,
}

/// Messages from ingest tasks to the writer.
pub(crate) enum SinkOp<E> {
    /// Persist one entity.
    Save {
        source_id: String,
        name: String,
        entity: E,
    },
    /// The source finished a batch; every `Save` of that batch came before.
    Settle {
        source_id: String,
        first: bool,
        failures: Vec<FailedItem>,
    },
}

/// Source id sets a pass works against.
pub(crate) struct PassScope {
    /// Every id in the merged config, enabled or not.
    pub(crate) configured: BTreeSet<String>,
    pub(crate) enabled: BTreeSet<String>,
    /// Configured ids across all catalog kinds.
    pub(crate) all_known: BTreeSet<String>,
    /// Sources whose provider started but has not settled a batch yet.
    pub(crate) pending_first_batch: HashSet<String>,
}

/// Save outcomes of one source's current batch.
#[derive(Default)]
struct Tally {
    /// Logical names that reached storage.
    saved: HashSet<String>,
    failures: Vec<FailedItem>,
}

pub(crate) struct Writer<'a, K: CatalogKind> {
    pub(crate) kind: &'a K,
    pub(crate) state: &'a BaseLoaderState,
    pub(crate) statuses: &'a dyn SourceStatusRepository,
    pub(crate) handlers: &'a [Arc<dyn RecordHandler<K::Entity>>],
    pub(crate) cancel: &'a CancellationToken,
    pub(crate) scope: PassScope,
}

impl<K: CatalogKind> Writer<'_, K> {
    /// Consume the sink until every ingest task has dropped its sender.
    pub(crate) async fn run(
        mut self,
        mut rx: mpsc::Receiver<SinkOp<K::Entity>>,
    ) -> Result<(), LoaderError> {
        let mut tallies: HashMap<String, Tally> = HashMap::new();
        let mut swept = self.sweep_if_settled(false).await?;

        while let Some(op) = rx.recv().await {
            match op {
                SinkOp::Save {
                    source_id,
                    name,
                    entity,
                } => {
                    let tally = tallies.entry(source_id).or_default();
                    self.save(tally, name, &entity).await;
                }
                SinkOp::Settle {
                    source_id,
                    first,
                    failures,
                } => {
                    let tally = tallies.remove(&source_id).unwrap_or_default();
                    self.settle(&source_id, tally, failures).await?;
                    if first {
                        self.scope.pending_first_batch.remove(&source_id);
                    }
                    swept = self.sweep_if_settled(swept).await?;
                }
            }
        }
        Ok(())
    }

    fn stopped(&self) -> bool {
        self.cancel.is_cancelled() || !self.state.is_leader()
    }

    async fn save(&self, tally: &mut Tally, name: String, entity: &K::Entity) {
        if self.stopped() {
            return;
        }

        let result = {
            let _write = self.state.begin_write();
            self.kind.save(entity).await
        };

        match result {
            Ok(()) => {
                debug!(kind = K::SOURCE_KIND.as_str(), name = %name, "Saved entity");
                for handler in self.handlers {
                    if let Err(e) = handler.handle(self.cancel, entity).await {
                        warn!(
                            kind = K::SOURCE_KIND.as_str(),
                            name = %name,
                            error = %e,
                            "Record handler failed"
                        );
                    }
                }
                tally.saved.insert(name);
            }
            Err(e) => {
                warn!(kind = K::SOURCE_KIND.as_str(), name = %name, error = %e, "Failed to save entity");
                tally.failures.push(FailedItem {
                    item: name,
                    error: e.to_string(),
                });
            }
        }
    }

    async fn settle(
        &self,
        source_id: &str,
        tally: Tally,
        mut failures: Vec<FailedItem>,
    ) -> Result<(), LoaderError> {
        if self.stopped() {
            debug!(kind = K::SOURCE_KIND.as_str(), source_id = %source_id, "Pass stopped, skipping status and cleanup");
            return Ok(());
        }
        failures.extend(tally.failures);
        let saved = tally.saved;

        let outcome = batch_outcome(source_id, saved.len(), &failures);
        let status = match &outcome {
            Ok(()) => {
                info!(kind = K::SOURCE_KIND.as_str(), source_id = %source_id, saved = saved.len(), "Source loaded");
                SourceStatus::available(source_id)
            }
            Err(e) if e.is_partially_available() => {
                warn!(
                    kind = K::SOURCE_KIND.as_str(),
                    source_id = %source_id,
                    saved = saved.len(),
                    failed = failures.len(),
                    "Source partially loaded"
                );
                SourceStatus::partially_available(
                    source_id,
                    format!("{e}: {}", failure_details(&failures)),
                )
            }
            Err(e) => {
                warn!(kind = K::SOURCE_KIND.as_str(), source_id = %source_id, error = %e, "Source failed to load");
                SourceStatus::error(source_id, e.to_string())
            }
        };

        {
            let _write = self.state.begin_write();
            if let Err(e) = self.statuses.save(&status).await {
                warn!(kind = K::SOURCE_KIND.as_str(), source_id = %source_id, error = %e, "Failed to save source status");
            }
        }

        cleanup::sweep_orphans(self.kind, self.state, source_id, &saved).await?;
        Ok(())
    }

    /// Run the cross-source and status sweeps once every started source
    /// has settled its first batch. Returns whether they have run.
    async fn sweep_if_settled(&self, swept: bool) -> Result<bool, LoaderError> {
        if swept || !self.scope.pending_first_batch.is_empty() || self.stopped() {
            return Ok(swept);
        }
        cleanup::sweep_removed_sources(
            self.kind,
            self.state,
            self.statuses,
            &self.scope,
        )
        .await?;
        cleanup::sweep_statuses(self.state, self.statuses, &self.scope).await?;
        Ok(true)
    }
}

fn failure_details(failures: &[FailedItem]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.item, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Classify one settled batch.
fn batch_outcome(
    source_id: &str,
    saved: usize,
    failures: &[FailedItem],
) -> Result<(), LoaderError> {
    if failures.is_empty() {
        Ok(())
    } else if saved == 0 {
        Err(LoaderError::AllFailed {
            source_id: source_id.to_string(),
            count: failures.len(),
            details: failure_details(failures),
        })
    } else {
        Err(PartiallyAvailableError {
            failed_items: failures.iter().map(|f| f.item.clone()).collect(),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(item: &str) -> FailedItem {
        FailedItem {
            item: item.to_string(),
            error: "boom".to_string(),
        }
    }

    #[test]
    fn test_batch_outcome() {
        assert!(batch_outcome("s", 3, &[]).is_ok());
        assert!(batch_outcome("s", 0, &[]).is_ok());

        let partial = batch_outcome("s", 2, &[failed("a"), failed("b")]).unwrap_err();
        assert!(partial.is_partially_available());
        let LoaderError::PartiallyAvailable(inner) = partial else {
            panic!("expected partial availability");
        };
        assert_eq!(inner.failed_items, vec!["a".to_string(), "b".to_string()]);

        let all = batch_outcome("s", 0, &[failed("a")]).unwrap_err();
        assert!(!all.is_partially_available());
        assert!(all.to_string().contains("a: boom"));
    }
}
