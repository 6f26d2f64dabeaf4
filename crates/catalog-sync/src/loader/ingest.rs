//! Per-source ingest task.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::writer::{FailedItem, SinkOp};
use crate::kind::CatalogKind;
use crate::provider::{Provider, Record};
use crate::state::BaseLoaderState;

/// What one source has produced since its last settled batch.
#[derive(Default)]
struct Batch {
    failures: Vec<FailedItem>,
    dirty: bool,
}

/// Drain one provider into the shared sink.
///
/// Stops forwarding as soon as the pass is cancelled or leadership is lost,
/// then drains the provider's channel so its task can finish.
pub(super) async fn drain_source<K: CatalogKind>(
    source_id: String,
    provider: Box<dyn Provider<K::Entity>>,
    cancel: CancellationToken,
    state: Arc<BaseLoaderState>,
    sink: mpsc::Sender<SinkOp<K::Entity>>,
) {
    let mut rx = provider.emit(cancel.clone());
    let mut batch = Batch::default();
    let mut settled_once = false;

    while let Some(record) = rx.recv().await {
        if cancel.is_cancelled() || !state.is_leader() {
            abandon(&source_id, &cancel, &mut rx).await;
            return;
        }

        let forwarded = match record {
            Record::Item(mut entity) => {
                K::stamp_source(&mut entity, &source_id);
                let name = K::logical_name(&entity);
                batch.dirty = true;
                sink.send(SinkOp::Save {
                    source_id: source_id.clone(),
                    name,
                    entity,
                })
                .await
                .is_ok()
            }
            Record::Failed { item, error } => {
                debug!(source_id = %source_id, item = %item, error = %error, "Provider reported a failed item");
                batch.failures.push(FailedItem { item, error });
                batch.dirty = true;
                true
            }
            Record::BatchEnd => {
                let sent = settle(&source_id, &sink, &mut batch, !settled_once).await;
                settled_once = true;
                sent
            }
        };

        if !forwarded {
            abandon(&source_id, &cancel, &mut rx).await;
            return;
        }
    }

    if cancel.is_cancelled() || !state.is_leader() {
        return;
    }
    // Streams that close without a trailing batch end still settle
    if !settled_once || batch.dirty {
        settle(&source_id, &sink, &mut batch, !settled_once).await;
    }
}

async fn settle<E>(
    source_id: &str,
    sink: &mpsc::Sender<SinkOp<E>>,
    batch: &mut Batch,
    first: bool,
) -> bool {
    let batch = std::mem::take(batch);
    sink.send(SinkOp::Settle {
        source_id: source_id.to_string(),
        first,
        failures: batch.failures,
    })
    .await
    .is_ok()
}

async fn abandon<E>(
    source_id: &str,
    cancel: &CancellationToken,
    rx: &mut mpsc::Receiver<Record<E>>,
) {
    debug!(source_id = %source_id, "Stopping ingest, draining provider");
    cancel.cancel();
    while rx.recv().await.is_some() {}
}
