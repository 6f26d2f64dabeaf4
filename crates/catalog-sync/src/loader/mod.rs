//! Leader-gated synchronization loader.
//!
//! One [`Loader`] exists per catalog kind. It owns the merged view of that
//! kind's source configuration and, while this replica is leader, runs
//! passes that pull every enabled source through its provider into storage.
//!
//! # Pass structure
//!
//! ```text
//! provider ─► ingest task ─┐
//! provider ─► ingest task ─┼─► sink (bounded mpsc) ─► writer ─► repositories
//! provider ─► ingest task ─┘
//! ```
//!
//! Ingest tasks only read and forward; the writer is the only task that
//! touches storage during a pass. Status, orphan and cross-source cleanup
//! for a source run in the writer after all of that source's records.

mod cleanup;
mod ingest;
mod writer;

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::{SourceStatus, SourceStatusRepository};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{read_sources_config, read_sources_configs};
use crate::error::LoaderError;
use crate::kind::{CatalogKind, RecordHandler};
use crate::provider::ProviderRegistry;
use crate::sources::SourceCollection;
use crate::state::BaseLoaderState;

use self::writer::{PassScope, Writer};

/// Default capacity of the shared write sink.
pub const DEFAULT_SINK_CAPACITY: usize = 256;

/// Default time to wait for in-flight writes on shutdown.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Tuning knobs of a loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Records buffered between ingest tasks and the writer.
    pub sink_capacity: usize,
    /// How long shutdown waits for in-flight writes.
    pub drain_timeout: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            sink_capacity: DEFAULT_SINK_CAPACITY,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Synchronization loader for one catalog kind.
pub struct Loader<K: CatalogKind> {
    kind: Arc<K>,
    state: Arc<BaseLoaderState>,
    sources: Arc<SourceCollection>,
    providers: Arc<ProviderRegistry<K::Entity>>,
    statuses: Arc<dyn SourceStatusRepository>,
    handlers: Vec<Arc<dyn RecordHandler<K::Entity>>>,
    config_paths: Vec<PathBuf>,
    options: LoaderOptions,
    pass_lock: Mutex<()>,
}

impl<K: CatalogKind> Loader<K> {
    pub fn new(
        kind: K,
        providers: Arc<ProviderRegistry<K::Entity>>,
        statuses: Arc<dyn SourceStatusRepository>,
        config_paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            kind: Arc::new(kind),
            state: Arc::new(BaseLoaderState::new()),
            sources: Arc::new(SourceCollection::new()),
            providers,
            statuses,
            handlers: Vec::new(),
            config_paths,
            options: LoaderOptions::default(),
            pass_lock: Mutex::new(()),
        }
    }

    /// Add a hook run after every successfully persisted record.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn RecordHandler<K::Entity>>) -> Self {
        self.handlers.push(handler);
        self
    }

    #[must_use]
    pub const fn with_options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> &Arc<BaseLoaderState> {
        &self.state
    }

    pub fn sources(&self) -> &Arc<SourceCollection> {
        &self.sources
    }

    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config_paths
    }

    pub const fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Read, validate and merge every config path.
    ///
    /// All files are read before anything is merged, so a failure leaves
    /// the collection untouched.
    pub fn parse_all_configs(&self) -> Result<(), LoaderError> {
        let parsed = read_sources_configs(&self.config_paths, K::SOURCE_KIND)?;
        for (origin, sources) in parsed {
            debug!(
                kind = K::SOURCE_KIND.as_str(),
                origin = %origin.display(),
                sources = sources.len(),
                "Merged sources config"
            );
            self.sources.merge(origin, sources);
        }
        info!(
            kind = K::SOURCE_KIND.as_str(),
            files = self.config_paths.len(),
            sources = self.sources.all_sources().len(),
            "Parsed sources configs"
        );
        Ok(())
    }

    /// Re-read every config path, keeping the previous contribution of any
    /// file that fails.
    pub fn reload_parsing(&self) {
        for path in &self.config_paths {
            match read_sources_config(path) {
                Ok(config) => {
                    let sources = config.sources_for(K::SOURCE_KIND);
                    self.sources.merge(config.path, sources);
                }
                Err(e) => warn!(
                    kind = K::SOURCE_KIND.as_str(),
                    path = %path.display(),
                    error = %e,
                    "Failed to reload sources config, keeping previous contents"
                ),
            }
        }
    }

    /// Ids of every configured source of this kind, enabled or not.
    pub fn configured_source_ids(&self) -> BTreeSet<String> {
        self.sources.all_sources().into_keys().collect()
    }

    /// Run one leader pass.
    ///
    /// A new pass cancels the one before it and waits for it to finish.
    /// Returns once every provider stream has closed, or the pass was
    /// cancelled. Source-scoped failures end up in source statuses; only
    /// storage failures of the cleanup steps are returned.
    ///
    /// `all_known_source_ids` holds the configured ids of every catalog
    /// kind, so that statuses shared between kinds are never removed by the
    /// wrong loader.
    pub async fn perform_leader_operations(
        &self,
        cancel: &CancellationToken,
        all_known_source_ids: &BTreeSet<String>,
    ) -> Result<(), LoaderError> {
        let kind = K::SOURCE_KIND.as_str();
        if !self.state.is_leader() {
            debug!(kind, "Not leader, skipping pass");
            return Ok(());
        }

        let pass = cancel.child_token();
        let closer = pass.clone();
        self.state.set_closer(Box::new(move || closer.cancel()));

        let _pass_guard = self.pass_lock.lock().await;
        if pass.is_cancelled() {
            debug!(kind, "Pass cancelled before it started");
            return Ok(());
        }

        let sources = self.sources.all_sources();
        let configured: BTreeSet<String> = sources.keys().cloned().collect();
        info!(kind, sources = sources.len(), "Starting leader pass");

        let (sink_tx, sink_rx) = mpsc::channel(self.options.sink_capacity.max(1));
        let mut tasks = JoinSet::new();
        let mut enabled = BTreeSet::new();
        let mut started = HashSet::new();

        for (source_id, source) in &sources {
            if !source.is_enabled() {
                debug!(kind, source_id = %source_id, "Source disabled");
                self.write_status(&pass, SourceStatus::disabled(source_id))
                    .await;
                continue;
            }
            enabled.insert(source_id.clone());

            let provider = match self.providers.create(source) {
                Ok(provider) => provider,
                Err(e) => {
                    warn!(kind, source_id = %source_id, error = %e, "Failed to start provider");
                    self.write_status(&pass, SourceStatus::error(source_id, e.to_string()))
                        .await;
                    continue;
                }
            };

            started.insert(source_id.clone());
            tasks.spawn(ingest::drain_source::<K>(
                source_id.clone(),
                provider,
                pass.child_token(),
                Arc::clone(&self.state),
                sink_tx.clone(),
            ));
        }
        drop(sink_tx);

        let writer = Writer {
            kind: self.kind.as_ref(),
            state: self.state.as_ref(),
            statuses: self.statuses.as_ref(),
            handlers: &self.handlers,
            cancel: &pass,
            scope: PassScope {
                configured,
                enabled,
                all_known: all_known_source_ids.clone(),
                pending_first_batch: started,
            },
        };
        let mut result = writer.run(sink_rx).await;
        if result.is_err() {
            pass.cancel();
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(kind, error = %e, "Ingest task failed");
                if result.is_ok() && e.is_panic() {
                    result = Err(LoaderError::Task(e.to_string()));
                }
            }
        }

        match &result {
            Ok(()) if pass.is_cancelled() => info!(kind, "Leader pass cancelled"),
            Ok(()) => info!(kind, "Leader pass complete"),
            Err(e) => warn!(kind, error = %e, "Leader pass failed"),
        }
        result
    }

    async fn write_status(&self, cancel: &CancellationToken, status: SourceStatus) {
        if cancel.is_cancelled() || !self.state.is_leader() {
            return;
        }
        let _write = self.state.begin_write();
        if let Err(e) = self.statuses.save(&status).await {
            warn!(
                kind = K::SOURCE_KIND.as_str(),
                source_id = %status.source_id,
                error = %e,
                "Failed to save source status"
            );
        }
    }
}
