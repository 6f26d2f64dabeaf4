//! Supervisor driving both loaders from a leadership signal.
//!
//! Leadership arrives on a `tokio::sync::watch` channel so that any election
//! mechanism can sit behind it. Passes run in background tasks; the
//! supervisor itself only reacts to leadership flips, config changes and
//! shutdown.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use catalog_core::{McpServerRecord, Model, Repos};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SourceKind;
use crate::error::LoaderError;
use crate::kind::{CatalogKind, McpKind, ModelKind};
use crate::loader::{DEFAULT_DRAIN_TIMEOUT, Loader};
use crate::provider::ProviderRegistry;
use crate::watch::ConfigWatcher;

type PassSet = JoinSet<(SourceKind, Result<(), LoaderError>)>;

/// Runtime settings of a [`CatalogSync`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Watch config files and reload on change.
    pub watch_configs: bool,
    /// How long shutdown waits for in-flight writes and running passes.
    pub drain_timeout: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            watch_configs: false,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Owns the model and MCP loaders of one replica.
pub struct CatalogSync {
    models: Arc<Loader<ModelKind>>,
    mcp: Arc<Loader<McpKind>>,
    options: SyncOptions,
}

impl CatalogSync {
    pub fn new(models: Loader<ModelKind>, mcp: Loader<McpKind>) -> Self {
        Self {
            models: Arc::new(models),
            mcp: Arc::new(mcp),
            options: SyncOptions::default(),
        }
    }

    /// Build both loaders over `repos`, reading every config path for both
    /// kinds.
    pub fn from_repos(
        repos: &Repos,
        model_providers: Arc<ProviderRegistry<Model>>,
        mcp_providers: Arc<ProviderRegistry<McpServerRecord>>,
        model_configs: Vec<std::path::PathBuf>,
        mcp_configs: Vec<std::path::PathBuf>,
    ) -> Self {
        Self::new(
            Loader::new(
                ModelKind::from_repos(repos),
                model_providers,
                Arc::clone(&repos.source_statuses),
                model_configs,
            ),
            Loader::new(
                McpKind::from_repos(repos),
                mcp_providers,
                Arc::clone(&repos.source_statuses),
                mcp_configs,
            ),
        )
    }

    #[must_use]
    pub const fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub const fn models(&self) -> &Arc<Loader<ModelKind>> {
        &self.models
    }

    pub const fn mcp(&self) -> &Arc<Loader<McpKind>> {
        &self.mcp
    }

    pub fn is_leader(&self) -> bool {
        self.models.state().is_leader()
    }

    /// Strictly parse both loaders' configs.
    pub fn parse_all_configs(&self) -> Result<(), LoaderError> {
        self.models.parse_all_configs()?;
        self.mcp.parse_all_configs()
    }

    /// Configured source ids of both kinds.
    pub fn all_known_source_ids(&self) -> BTreeSet<String> {
        let mut ids = self.models.configured_source_ids();
        ids.extend(self.mcp.configured_source_ids());
        ids
    }

    /// Run until `cancel` fires or the leadership channel closes.
    ///
    /// The initial config parse is strict; later reloads keep the previous
    /// contents of files that fail.
    pub async fn start(
        &self,
        mut leader: watch::Receiver<bool>,
        cancel: CancellationToken,
    ) -> Result<(), LoaderError> {
        self.parse_all_configs()?;

        let (reload_tx, mut reload_rx) = mpsc::channel(1);
        let mut watchers = Vec::new();
        if self.options.watch_configs {
            watchers.push(start_watcher(&self.models, &cancel, reload_tx.clone())?);
            watchers.push(start_watcher(&self.mcp, &cancel, reload_tx.clone())?);
        }

        let mut passes = PassSet::new();
        if *leader.borrow_and_update() {
            self.become_leader(&cancel, &mut passes);
        } else {
            info!("Starting as standby");
        }

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                changed = leader.changed() => {
                    if changed.is_err() {
                        info!("Leadership signal closed, shutting down");
                        break;
                    }
                    let is_leader = *leader.borrow_and_update();
                    if is_leader && !self.is_leader() {
                        self.become_leader(&cancel, &mut passes);
                    } else if !is_leader && self.is_leader() {
                        self.lose_leadership();
                    }
                }
                Some(()) = reload_rx.recv() => {
                    info!("Sources config changed");
                    if self.is_leader() {
                        self.run_passes(&cancel, &mut passes);
                    } else {
                        self.models.reload_parsing();
                        self.mcp.reload_parsing();
                    }
                }
                Some(joined) = passes.join_next() => log_pass_result(joined),
            }
        }

        drop(reload_tx);
        self.shutdown(watchers, passes).await;
        Ok(())
    }

    fn become_leader(&self, cancel: &CancellationToken, passes: &mut PassSet) {
        info!("Became leader");
        self.models.state().set_leader(true);
        self.mcp.state().set_leader(true);
        self.run_passes(cancel, passes);
    }

    fn lose_leadership(&self) {
        info!("Lost leadership, cancelling passes");
        self.models.state().set_leader(false);
        self.mcp.state().set_leader(false);
        self.models.state().close();
        self.mcp.state().close();
    }

    /// Reload configs and start a fresh pass for each kind.
    fn run_passes(&self, cancel: &CancellationToken, passes: &mut PassSet) {
        self.models.reload_parsing();
        self.mcp.reload_parsing();
        let all_known = self.all_known_source_ids();
        spawn_pass(passes, &self.models, cancel, all_known.clone());
        spawn_pass(passes, &self.mcp, cancel, all_known);
    }

    async fn shutdown(&self, watchers: Vec<ConfigWatcher>, mut passes: PassSet) {
        info!("Shutting down catalog sync");
        self.models.state().stop_file_watchers();
        self.mcp.state().stop_file_watchers();
        for watcher in watchers {
            watcher.join().await;
        }

        self.models.state().close();
        self.mcp.state().close();

        let drain = self.options.drain_timeout;
        self.models.state().wait_for_inflight_writes(drain).await;
        self.mcp.state().wait_for_inflight_writes(drain).await;

        let finished = tokio::time::timeout(drain, async {
            while let Some(joined) = passes.join_next().await {
                log_pass_result(joined);
            }
        })
        .await;
        if finished.is_err() {
            warn!(remaining = passes.len(), "Passes still running after drain timeout");
            passes.detach_all();
        }
    }
}

fn start_watcher<K: CatalogKind>(
    loader: &Loader<K>,
    cancel: &CancellationToken,
    reload_tx: mpsc::Sender<()>,
) -> Result<ConfigWatcher, LoaderError> {
    let token = loader.state().setup_file_watchers(cancel)?;
    ConfigWatcher::start(K::SOURCE_KIND.as_str(), loader.config_paths(), token, reload_tx)
}

fn spawn_pass<K: CatalogKind>(
    passes: &mut PassSet,
    loader: &Arc<Loader<K>>,
    cancel: &CancellationToken,
    all_known: BTreeSet<String>,
) {
    let loader = Arc::clone(loader);
    let cancel = cancel.clone();
    passes.spawn(async move {
        let result = loader.perform_leader_operations(&cancel, &all_known).await;
        (K::SOURCE_KIND, result)
    });
}

fn log_pass_result(joined: Result<(SourceKind, Result<(), LoaderError>), tokio::task::JoinError>) {
    match joined {
        Ok((kind, Ok(()))) => debug!(kind = kind.as_str(), "Pass finished"),
        Ok((kind, Err(e))) => warn!(kind = kind.as_str(), error = %e, "Pass failed"),
        Err(e) => warn!(error = %e, "Pass task panicked"),
    }
}
