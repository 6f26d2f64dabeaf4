//! Shared mutable state of one loader instance.
//!
//! # Design Rules
//!
//! - Locks guard only the flag, counter, or handle they protect and are
//!   never held across an `.await`
//! - The in-flight counter lives in a `watch` channel so draining can await
//!   it instead of polling

use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::LoaderError;

/// Cancel callback of the currently running leader pass.
pub type Closer = Box<dyn FnOnce() + Send>;

/// Leader flag, in-flight write counter, pass closer, and watcher lifecycle.
pub struct BaseLoaderState {
    leader: RwLock<bool>,
    inflight: watch::Sender<usize>,
    closer: Mutex<Option<Closer>>,
    watchers: Mutex<Option<CancellationToken>>,
}

impl Default for BaseLoaderState {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseLoaderState {
    pub fn new() -> Self {
        let (inflight, _) = watch::channel(0);
        Self {
            leader: RwLock::new(false),
            inflight,
            closer: Mutex::new(None),
            watchers: Mutex::new(None),
        }
    }

    pub fn is_leader(&self) -> bool {
        *self.leader.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_leader(&self, leader: bool) {
        *self.leader.write().unwrap_or_else(PoisonError::into_inner) = leader;
    }

    /// Count one durable write as started.
    pub fn track_write(&self) {
        self.inflight.send_modify(|n| *n += 1);
    }

    /// Count one durable write as finished.
    pub fn write_complete(&self) {
        self.inflight.send_modify(|n| *n = n.saturating_sub(1));
    }

    /// Track a write for as long as the returned guard lives.
    pub fn begin_write(&self) -> WriteGuard<'_> {
        self.track_write();
        WriteGuard { state: self }
    }

    /// Number of writes currently in flight.
    pub fn inflight_writes(&self) -> usize {
        *self.inflight.borrow()
    }

    /// Wait until no write is in flight, or until `timeout` elapses.
    ///
    /// Never fails; a timeout is only logged and the pending writes are left
    /// to finish on their own.
    pub async fn wait_for_inflight_writes(&self, timeout: Duration) {
        let mut rx = self.inflight.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|n| *n == 0)).await {
            Ok(_) => info!("All in-flight writes completed"),
            Err(_) => warn!(
                pending = self.inflight_writes(),
                timeout_ms = timeout.as_millis(),
                "Timed out waiting for in-flight writes"
            ),
        }
    }

    /// Derive the token that file watchers run under.
    ///
    /// Fails if watchers are already running; call
    /// [`stop_file_watchers`](Self::stop_file_watchers) first.
    pub fn setup_file_watchers(
        &self,
        parent: &CancellationToken,
    ) -> Result<CancellationToken, LoaderError> {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        if watchers.is_some() {
            return Err(LoaderError::WatchersAlreadyRunning);
        }
        let token = parent.child_token();
        *watchers = Some(token.clone());
        Ok(token)
    }

    /// Stop file watchers if running. Safe to call repeatedly.
    pub fn stop_file_watchers(&self) {
        let token = self
            .watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }

    pub fn watchers_running(&self) -> bool {
        self.watchers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Install the closer of a new pass, invoking the previous one first.
    pub fn set_closer(&self, closer: Closer) {
        let previous = self
            .closer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(closer);
        if let Some(previous) = previous {
            previous();
        }
    }

    /// Invoke and clear the current closer, if any.
    pub fn close(&self) {
        let current = self
            .closer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(current) = current {
            current();
        }
    }
}

/// RAII handle for one tracked write.
pub struct WriteGuard<'a> {
    state: &'a BaseLoaderState,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        self.state.write_complete();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_leader_flag() {
        let state = BaseLoaderState::new();
        assert!(!state.is_leader());
        state.set_leader(true);
        assert!(state.is_leader());
        state.set_leader(false);
        assert!(!state.is_leader());
    }

    #[test]
    fn test_write_guard_tracks() {
        let state = BaseLoaderState::new();
        {
            let _a = state.begin_write();
            let _b = state.begin_write();
            assert_eq!(state.inflight_writes(), 2);
        }
        assert_eq!(state.inflight_writes(), 0);

        state.write_complete();
        assert_eq!(state.inflight_writes(), 0);
    }

    #[tokio::test]
    async fn test_wait_returns_when_drained() {
        let state = Arc::new(BaseLoaderState::new());
        state.track_write();

        let finisher = Arc::clone(&state);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            finisher.write_complete();
        });

        state.wait_for_inflight_writes(Duration::from_secs(5)).await;
        assert_eq!(state.inflight_writes(), 0);
    }

    #[tokio::test]
    async fn test_wait_times_out_without_error() {
        let state = BaseLoaderState::new();
        state.track_write();

        state.wait_for_inflight_writes(Duration::from_millis(1)).await;

        assert_eq!(state.inflight_writes(), 1);
    }

    #[test]
    fn test_file_watchers_guard_double_start() {
        let state = BaseLoaderState::new();
        let parent = CancellationToken::new();

        let token = state.setup_file_watchers(&parent).unwrap();
        assert!(matches!(
            state.setup_file_watchers(&parent),
            Err(LoaderError::WatchersAlreadyRunning)
        ));

        state.stop_file_watchers();
        assert!(token.is_cancelled());
        state.stop_file_watchers();

        assert!(state.setup_file_watchers(&parent).is_ok());
    }

    #[test]
    fn test_set_closer_invokes_previous() {
        let state = BaseLoaderState::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = Arc::clone(&calls);
        state.set_closer(Box::new(move || {
            first.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let second = Arc::clone(&calls);
        state.set_closer(Box::new(move || {
            second.fetch_add(10, Ordering::SeqCst);
        }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        state.close();
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        state.close();
        assert_eq!(calls.load(Ordering::SeqCst), 11);
    }
}
