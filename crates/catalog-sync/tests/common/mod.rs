//! Shared fixtures for loader integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use catalog_core::{McpServer, McpServerRecord, McpServerTool, Model, SourceDefinition};
use catalog_sync::error::ProviderError;
use catalog_sync::provider::{Provider, ProviderRegistry, Record};
use tokio::sync::{Notify, mpsc};
use tokio_util::sync::CancellationToken;

/// Provider type served by [`Scripts`].
pub const SCRIPTED: &str = "scripted";

/// What one scripted source emits.
#[derive(Clone)]
pub struct Script<E> {
    pub records: Vec<Record<E>>,
    /// When set, nothing is emitted until the gate is opened.
    pub gate: Option<Arc<Notify>>,
}

impl<E> Script<E> {
    pub fn new(records: Vec<Record<E>>) -> Self {
        Self {
            records,
            gate: None,
        }
    }

    pub fn gated(records: Vec<Record<E>>, gate: Arc<Notify>) -> Self {
        Self {
            records,
            gate: Some(gate),
        }
    }
}

/// Per-source scripts plus a count of provider tasks still running.
pub struct Scripts<E> {
    scripts: Mutex<HashMap<String, Script<E>>>,
    running: Arc<AtomicUsize>,
}

impl<E: Clone + Send + 'static> Scripts<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            running: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn set(&self, source_id: &str, script: Script<E>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(source_id.to_string(), script);
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// A registry serving these scripts under [`SCRIPTED`].
    pub fn registry(self: &Arc<Self>) -> Arc<ProviderRegistry<E>> {
        let registry = ProviderRegistry::new();
        let scripts = Arc::clone(self);
        registry
            .register(
                SCRIPTED,
                Arc::new(move |source: &SourceDefinition| {
                    let script = scripts
                        .scripts
                        .lock()
                        .unwrap()
                        .get(&source.id)
                        .cloned()
                        .ok_or_else(|| ProviderError::Construction {
                            source_id: source.id.clone(),
                            message: "no script".to_string(),
                        })?;
                    Ok(Box::new(ScriptedProvider {
                        script,
                        running: Arc::clone(&scripts.running),
                    }) as Box<dyn Provider<E>>)
                }),
            )
            .unwrap();
        Arc::new(registry)
    }
}

struct ScriptedProvider<E> {
    script: Script<E>,
    running: Arc<AtomicUsize>,
}

impl<E: Send + 'static> Provider<E> for ScriptedProvider<E> {
    fn emit(self: Box<Self>, cancel: CancellationToken) -> mpsc::Receiver<Record<E>> {
        let (tx, rx) = mpsc::channel(4);
        self.running.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let Script { records, gate } = self.script;
            let opened = match gate {
                Some(gate) => tokio::select! {
                    () = cancel.cancelled() => false,
                    () = gate.notified() => true,
                },
                None => true,
            };
            if opened {
                for record in records {
                    if cancel.is_cancelled() || tx.send(record).await.is_err() {
                        break;
                    }
                }
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
            drop(tx);
        });
        rx
    }
}

pub fn model(name: &str) -> Record<Model> {
    Record::Item(Model::new(name))
}

pub fn failed<E>(item: &str) -> Record<E> {
    Record::Failed {
        item: item.to_string(),
        error: "malformed entry".to_string(),
    }
}

pub fn server(base: &str, version: &str, tools: &[&str]) -> Record<McpServerRecord> {
    Record::Item(McpServerRecord::new(
        McpServer::new(base, version),
        tools.iter().map(|t| McpServerTool::new(*t)).collect(),
    ))
}

/// Write `contents` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Poll `check` until it returns true, failing after five seconds.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
