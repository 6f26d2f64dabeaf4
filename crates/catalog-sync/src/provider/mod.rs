//! Provider contract and registry.
//!
//! A provider streams the entries of one source. Source `type` strings are
//! resolved to provider factories through a [`ProviderRegistry`], one per
//! catalog kind.
//!
//! # Contract
//!
//! - [`Provider::emit`] spawns its own task and returns the receiving end
//!   immediately
//! - The channel is always closed when the provider is done, including on
//!   error or cancellation
//! - Cancellation is checked between records, never in the middle of one
//! - A provider that cannot start at all fails in its factory with a
//!   [`ProviderError`], not through the channel

mod yaml_mcp;
mod yaml_models;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use catalog_core::{McpServerRecord, Model, Property, PropertyValue, SourceDefinition};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use wildmatch::WildMatch;

use crate::error::ProviderError;

pub use yaml_mcp::YamlMcpProvider;
pub use yaml_models::YamlModelProvider;

/// Provider type of the built-in YAML providers.
pub const YAML_PROVIDER_TYPE: &str = "yaml";

/// Source property naming the YAML catalog file.
pub const YAML_CATALOG_PATH_PROPERTY: &str = "yamlCatalogPath";

/// Buffer size of provider channels.
pub(crate) const PROVIDER_CHANNEL_CAPACITY: usize = 64;

/// One unit of provider output.
#[derive(Debug, Clone, PartialEq)]
pub enum Record<E> {
    /// A successfully read entry.
    Item(E),
    /// An entry that could not be read.
    Failed { item: String, error: String },
    /// End of one batch; the stream stays open for the next one.
    BatchEnd,
}

/// Streaming source of catalog entries.
pub trait Provider<E>: Send {
    fn emit(self: Box<Self>, cancel: CancellationToken) -> mpsc::Receiver<Record<E>>;
}

/// Builds a provider for one source definition.
pub type ProviderFactory<E> =
    Arc<dyn Fn(&SourceDefinition) -> Result<Box<dyn Provider<E>>, ProviderError> + Send + Sync>;

/// Map from provider type to factory.
pub struct ProviderRegistry<E> {
    factories: RwLock<HashMap<String, ProviderFactory<E>>>,
}

impl<E> Default for ProviderRegistry<E> {
    fn default() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }
}

impl<E> ProviderRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. Registering a type twice is an error.
    pub fn register(
        &self,
        provider_type: &str,
        factory: ProviderFactory<E>,
    ) -> Result<(), ProviderError> {
        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if factories.contains_key(provider_type) {
            return Err(ProviderError::AlreadyRegistered(provider_type.to_string()));
        }
        factories.insert(provider_type.to_string(), factory);
        Ok(())
    }

    pub fn get(&self, provider_type: &str) -> Option<ProviderFactory<E>> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider_type)
            .cloned()
    }

    /// Remove a factory; returns whether one was registered.
    pub fn unregister(&self, provider_type: &str) -> bool {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(provider_type)
            .is_some()
    }

    /// Registered types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Look up the factory for `source` and build its provider.
    pub fn create(&self, source: &SourceDefinition) -> Result<Box<dyn Provider<E>>, ProviderError> {
        let factory = self
            .get(&source.source_type)
            .ok_or_else(|| ProviderError::UnknownType(source.source_type.clone()))?;
        factory(source)
    }
}

/// Resolve the YAML catalog file of `source` against its origin.
pub(crate) fn catalog_path(source: &SourceDefinition) -> Result<PathBuf, ProviderError> {
    source
        .resolve_path_property(YAML_CATALOG_PATH_PROPERTY)
        .ok_or_else(|| ProviderError::MissingProperty {
            source_id: source.id.clone(),
            property: YAML_CATALOG_PATH_PROPERTY.to_string(),
        })
}

/// Read a catalog file at construction time.
pub(crate) fn read_catalog(source: &SourceDefinition, path: &Path) -> Result<String, ProviderError> {
    std::fs::read_to_string(path).map_err(|e| ProviderError::Construction {
        source_id: source.id.clone(),
        message: format!("failed to read {}: {e}", path.display()),
    })
}

/// Include/exclude name patterns of a source.
#[derive(Debug, Default)]
pub(crate) struct NameFilter {
    include: Vec<WildMatch>,
    exclude: Vec<WildMatch>,
}

impl NameFilter {
    pub(crate) fn from_source(source: &SourceDefinition) -> Self {
        let compile = |patterns: &Option<Vec<String>>| {
            patterns
                .iter()
                .flatten()
                .map(|p| WildMatch::new(p))
                .collect::<Vec<_>>()
        };
        Self {
            include: compile(&source.included),
            exclude: compile(&source.excluded),
        }
    }

    /// Kept when it matches an include pattern (or there are none) and no
    /// exclude pattern.
    pub(crate) fn allows(&self, name: &str) -> bool {
        (self.include.is_empty() || self.include.iter().any(|p| p.matches(name)))
            && !self.exclude.iter().any(|p| p.matches(name))
    }
}

/// Convert a free-form YAML property map into a typed property list.
pub(crate) fn properties_from_map(map: &BTreeMap<String, Value>) -> Vec<Property> {
    map.iter()
        .map(|(name, value)| {
            let value = match value {
                Value::Bool(b) => PropertyValue::Bool(*b),
                Value::Number(n) => n.as_i64().map_or_else(
                    || PropertyValue::Double(n.as_f64().unwrap_or_default()),
                    PropertyValue::Int,
                ),
                Value::String(s) => PropertyValue::String(s.clone()),
                other => PropertyValue::String(other.to_string()),
            };
            Property::new(name, value)
        })
        .collect()
}

/// Send one batch, checking cancellation before every record.
///
/// Returns `false` if the pass was cancelled or the receiver is gone.
pub(crate) async fn send_batch<E>(
    tx: &mpsc::Sender<Record<E>>,
    cancel: &CancellationToken,
    records: Vec<Record<E>>,
) -> bool {
    for record in records {
        if cancel.is_cancelled() || tx.send(record).await.is_err() {
            return false;
        }
    }
    true
}

static MODEL_PROVIDERS: LazyLock<Arc<ProviderRegistry<Model>>> =
    LazyLock::new(|| Arc::new(ProviderRegistry::new()));

static MCP_PROVIDERS: LazyLock<Arc<ProviderRegistry<McpServerRecord>>> =
    LazyLock::new(|| Arc::new(ProviderRegistry::new()));

/// Process-wide model provider registry. Starts empty.
pub fn model_providers() -> Arc<ProviderRegistry<Model>> {
    Arc::clone(&MODEL_PROVIDERS)
}

/// Process-wide MCP provider registry. Starts empty.
pub fn mcp_providers() -> Arc<ProviderRegistry<McpServerRecord>> {
    Arc::clone(&MCP_PROVIDERS)
}

/// Register the built-in providers into the given registries.
pub fn register_yaml_providers(
    models: &ProviderRegistry<Model>,
    mcp: &ProviderRegistry<McpServerRecord>,
) -> Result<(), ProviderError> {
    models.register(
        YAML_PROVIDER_TYPE,
        Arc::new(|source: &SourceDefinition| {
            YamlModelProvider::from_source(source).map(|p| Box::new(p) as Box<dyn Provider<Model>>)
        }),
    )?;
    mcp.register(
        YAML_PROVIDER_TYPE,
        Arc::new(|source: &SourceDefinition| {
            YamlMcpProvider::from_source(source)
                .map(|p| Box::new(p) as Box<dyn Provider<McpServerRecord>>)
        }),
    )
}

/// Register the built-in providers into the process-wide registries.
///
/// Call once at startup; a second call fails with
/// [`ProviderError::AlreadyRegistered`].
pub fn register_builtin_providers() -> Result<(), ProviderError> {
    register_yaml_providers(&model_providers(), &mcp_providers())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl Provider<Model> for Silent {
        fn emit(self: Box<Self>, _cancel: CancellationToken) -> mpsc::Receiver<Record<Model>> {
            let (_tx, rx) = mpsc::channel(1);
            rx
        }
    }

    fn silent_factory() -> ProviderFactory<Model> {
        Arc::new(|_: &SourceDefinition| Ok(Box::new(Silent) as Box<dyn Provider<Model>>))
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let registry = ProviderRegistry::new();
        registry.register("silent", silent_factory()).unwrap();

        assert_eq!(
            registry.register("silent", silent_factory()),
            Err(ProviderError::AlreadyRegistered("silent".to_string()))
        );
        assert_eq!(registry.registered_types(), vec!["silent".to_string()]);
    }

    #[test]
    fn test_unregister_allows_reregistration() {
        let registry = ProviderRegistry::new();
        registry.register("silent", silent_factory()).unwrap();

        assert!(registry.unregister("silent"));
        assert!(!registry.unregister("silent"));
        assert!(registry.get("silent").is_none());
        registry.register("silent", silent_factory()).unwrap();
    }

    #[test]
    fn test_create_unknown_type() {
        let registry: ProviderRegistry<Model> = ProviderRegistry::new();
        let result = registry.create(&SourceDefinition::new("hf", "nope"));
        assert!(matches!(result, Err(ProviderError::UnknownType(t)) if t == "nope"));
    }

    #[tokio::test]
    async fn test_created_provider_closes_channel() {
        let registry = ProviderRegistry::new();
        registry.register("silent", silent_factory()).unwrap();

        let provider = registry.create(&SourceDefinition::new("hf", "silent")).unwrap();
        let mut rx = provider.emit(CancellationToken::new());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_name_filter() {
        let source = SourceDefinition {
            included: Some(vec!["granite-*".to_string(), "llama-?b".to_string()]),
            excluded: Some(vec!["*-beta".to_string()]),
            ..SourceDefinition::new("hf", "yaml")
        };
        let filter = NameFilter::from_source(&source);

        assert!(filter.allows("granite-8b"));
        assert!(filter.allows("llama-7b"));
        assert!(!filter.allows("llama-70b"));
        assert!(!filter.allows("granite-8b-beta"));
        assert!(!filter.allows("mistral"));
        assert!(NameFilter::default().allows("anything"));
    }

    #[test]
    fn test_properties_from_map() {
        let map: BTreeMap<String, Value> = serde_json::from_value(serde_json::json!({
            "license": "apache-2.0",
            "params": 8,
            "score": 0.5,
            "gated": true,
        }))
        .unwrap();

        let props = properties_from_map(&map);
        let get = |n: &str| props.iter().find(|p| p.name == n).map(|p| p.value.clone());
        assert_eq!(get("license"), Some(PropertyValue::from("apache-2.0")));
        assert_eq!(get("params"), Some(PropertyValue::Int(8)));
        assert_eq!(get("score"), Some(PropertyValue::Double(0.5)));
        assert_eq!(get("gated"), Some(PropertyValue::Bool(true)));
    }

    #[test]
    fn test_missing_catalog_path_property() {
        let err = catalog_path(&SourceDefinition::new("hf", "yaml")).unwrap_err();
        assert_eq!(
            err,
            ProviderError::MissingProperty {
                source_id: "hf".to_string(),
                property: YAML_CATALOG_PATH_PROPERTY.to_string(),
            }
        );
    }

    #[test]
    fn test_yaml_providers_register_once() {
        let models = ProviderRegistry::new();
        let mcp = ProviderRegistry::new();

        register_yaml_providers(&models, &mcp).unwrap();
        assert_eq!(models.registered_types(), vec![YAML_PROVIDER_TYPE.to_string()]);
        assert!(matches!(
            register_yaml_providers(&models, &mcp),
            Err(ProviderError::AlreadyRegistered(_))
        ));
    }
}
