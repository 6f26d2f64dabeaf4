//! YAML file provider for model sources.
//!
//! ```yaml
//! source: Hugging Face
//! models:
//!   - name: granite-8b-instruct
//!     description: Instruction tuned
//!     externalId: ibm/granite-8b
//!     properties:
//!       license: apache-2.0
//! ```
//!
//! With the source property `watch: true` the file is watched after the
//! first batch and re-emitted in full on every change.

use std::collections::BTreeMap;
use std::path::PathBuf;

use catalog_core::{Model, SourceDefinition, set_property};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{
    NameFilter, PROVIDER_CHANNEL_CAPACITY, Provider, Record, catalog_path, properties_from_map,
    read_catalog, send_batch,
};
use crate::error::ProviderError;
use crate::watch::FileEvents;

/// Source property enabling file watching.
pub const WATCH_PROPERTY: &str = "watch";

/// Property stamped with the catalog's `source` label, when present.
const PROVIDER_PROPERTY: &str = "provider";

#[derive(Debug, Deserialize)]
struct ModelCatalogFile {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    models: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

/// Streams the models listed in a YAML file.
pub struct YamlModelProvider {
    source_id: String,
    path: PathBuf,
    filter: NameFilter,
    watch: bool,
    initial: Vec<Record<Model>>,
}

impl YamlModelProvider {
    /// Build the provider for `source`, reading its catalog file once.
    pub fn from_source(source: &SourceDefinition) -> Result<Self, ProviderError> {
        let path = catalog_path(source)?;
        let text = read_catalog(source, &path)?;
        let filter = NameFilter::from_source(source);
        let initial = parse_catalog(&text, &filter).map_err(|message| {
            ProviderError::Construction {
                source_id: source.id.clone(),
                message: format!("failed to parse {}: {message}", path.display()),
            }
        })?;

        Ok(Self {
            source_id: source.id.clone(),
            path,
            filter,
            watch: source.property_bool(WATCH_PROPERTY).unwrap_or(false),
            initial,
        })
    }

    fn reload(&self) -> Vec<Record<Model>> {
        let parsed = std::fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|text| parse_catalog(&text, &self.filter));
        parsed.unwrap_or_else(|error| {
            vec![Record::Failed {
                item: self.path.display().to_string(),
                error,
            }]
        })
    }
}

impl Provider<Model> for YamlModelProvider {
    fn emit(self: Box<Self>, cancel: CancellationToken) -> mpsc::Receiver<Record<Model>> {
        let (tx, rx) = mpsc::channel(PROVIDER_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            let mut provider = *self;
            let initial = std::mem::take(&mut provider.initial);
            if !send_batch(&tx, &cancel, with_batch_end(initial)).await || !provider.watch {
                return;
            }

            let mut events = match FileEvents::watch(std::slice::from_ref(&provider.path)) {
                Ok(events) => events,
                Err(e) => {
                    warn!(source_id = %provider.source_id, error = %e, "Failed to watch model catalog");
                    return;
                }
            };

            while events.next_change(&cancel).await {
                debug!(
                    source_id = %provider.source_id,
                    path = %provider.path.display(),
                    "Model catalog changed, re-emitting"
                );
                if !send_batch(&tx, &cancel, with_batch_end(provider.reload())).await {
                    return;
                }
            }
        });

        rx
    }
}

fn with_batch_end(mut records: Vec<Record<Model>>) -> Vec<Record<Model>> {
    records.push(Record::BatchEnd);
    records
}

/// Parse a catalog file into records, skipping filtered names.
///
/// A malformed file is an error; a malformed entry becomes a
/// [`Record::Failed`].
fn parse_catalog(text: &str, filter: &NameFilter) -> Result<Vec<Record<Model>>, String> {
    let file: ModelCatalogFile = if text.trim().is_empty() {
        ModelCatalogFile {
            source: None,
            models: Vec::new(),
        }
    } else {
        serde_yaml_ng::from_str(text).map_err(|e| e.to_string())?
    };

    let mut records = Vec::with_capacity(file.models.len());
    for (index, raw) in file.models.into_iter().enumerate() {
        let label = raw
            .get("name")
            .and_then(Value::as_str)
            .map_or_else(|| format!("models[{index}]"), str::to_string);

        let entry: ModelEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                records.push(Record::Failed {
                    item: label,
                    error: e.to_string(),
                });
                continue;
            }
        };

        if entry.name.trim().is_empty() {
            records.push(Record::Failed {
                item: label,
                error: "model has no name".to_string(),
            });
            continue;
        }
        if !filter.allows(&entry.name) {
            continue;
        }

        records.push(Record::Item(entry.into_model(file.source.as_deref())));
    }
    Ok(records)
}

impl ModelEntry {
    fn into_model(self, provider: Option<&str>) -> Model {
        let mut model = Model::new(self.name);
        model.description = self.description;
        model.external_id = self.external_id;
        model.properties = properties_from_map(&self.properties);
        if let Some(provider) = provider {
            set_property(&mut model.properties, PROVIDER_PROPERTY, provider);
        }
        model
    }
}
