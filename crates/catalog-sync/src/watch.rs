//! File watching for config files and watched YAML catalogs.
//!
//! Events from `notify` arrive on its own thread and are forwarded into a
//! tokio channel. Consumers wait for the first relevant event, then let the
//! burst settle for [`DEBOUNCE`] before acting, so an editor's
//! write-rename-chmod sequence triggers a single reload.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::LoaderError;

/// Quiet period after the last event before a change is reported.
pub const DEBOUNCE: Duration = Duration::from_millis(250);

/// Canonical form of `path` used to match events against watched files.
///
/// Only the parent directory is resolved: the file itself may already be
/// gone when a delete or rename event arrives.
fn watch_key(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let dir = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
    Some(dir.join(name))
}

/// Live `notify` watcher plus the stream of changed paths it feeds.
pub(crate) struct FileEvents {
    _watcher: RecommendedWatcher,
    files: HashSet<PathBuf>,
    rx: mpsc::UnboundedReceiver<PathBuf>,
}

impl FileEvents {
    /// Watch the directories containing `files`.
    ///
    /// Directories are watched instead of the files themselves so that
    /// replace-on-save editors keep being observed.
    pub(crate) fn watch(files: &[PathBuf]) -> Result<Self, LoaderError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Ok(event) = res {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
            },
            Config::default(),
        )
        .map_err(|e| watch_error(files.first().map_or(Path::new(""), PathBuf::as_path), &e))?;

        let mut dirs = HashSet::new();
        for file in files {
            let dir = file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            if dirs.insert(dir.to_path_buf()) {
                watcher
                    .watch(dir, RecursiveMode::NonRecursive)
                    .map_err(|e| watch_error(dir, &e))?;
            }
        }

        Ok(Self {
            _watcher: watcher,
            files: files.iter().filter_map(|f| watch_key(f)).collect(),
            rx,
        })
    }

    fn is_relevant(&self, path: &Path) -> bool {
        watch_key(path).is_some_and(|key| self.files.contains(&key))
    }

    /// Wait for the next debounced change to one of the watched files.
    ///
    /// Returns `false` once `cancel` fires or the watcher stops.
    pub(crate) async fn next_change(&mut self, cancel: &CancellationToken) -> bool {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return false,
                event = self.rx.recv() => match event {
                    Some(path) if self.is_relevant(&path) => break,
                    Some(_) => {}
                    None => return false,
                },
            }
        }

        // Let the burst settle
        loop {
            tokio::select! {
                () = cancel.cancelled() => return false,
                () = tokio::time::sleep(DEBOUNCE) => return true,
                event = self.rx.recv() => {
                    if event.is_none() {
                        return false;
                    }
                }
            }
        }
    }
}

fn watch_error(path: &Path, e: &notify::Error) -> LoaderError {
    LoaderError::Watch {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Watches a set of config files and signals when any of them changes.
pub struct ConfigWatcher {
    handle: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Start watching `paths` until `cancel` fires.
    ///
    /// One `()` is sent on `reload_tx` per debounced change.
    pub fn start(
        label: &'static str,
        paths: &[PathBuf],
        cancel: CancellationToken,
        reload_tx: mpsc::Sender<()>,
    ) -> Result<Self, LoaderError> {
        let mut events = FileEvents::watch(paths)?;
        info!(kind = label, files = paths.len(), "Watching config files");

        let handle = tokio::spawn(async move {
            while events.next_change(&cancel).await {
                debug!(kind = label, "Config change detected");
                // A full buffer already holds a pending reload
                if let Err(mpsc::error::TrySendError::Closed(())) = reload_tx.try_send(()) {
                    warn!(kind = label, "Reload receiver dropped, stopping config watcher");
                    break;
                }
            }
            debug!(kind = label, "Config watcher stopped");
        });

        Ok(Self { handle })
    }

    /// Wait for the watcher task to end after its token was cancelled.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}
