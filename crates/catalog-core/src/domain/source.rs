//! Source definitions and per-source status.
//!
//! A source definition is one configured feed of catalog entries. The same
//! source id may be declared by several config files (origins); later
//! origins override earlier ones field by field through
//! [`SourceDefinition::merge_from`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A configured catalog source.
///
/// Optional fields distinguish "not set" from "set to empty" so that sparse
/// overrides (e.g. only `id` + `enabled`) inherit everything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDefinition {
    /// Stable identity, unique within a merged view.
    #[serde(default)]
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Provider key used to look up the provider factory.
    #[serde(default, rename = "type", skip_serializing_if = "String::is_empty")]
    pub source_type: String,

    /// Unset means enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<String>>,

    /// Opaque provider settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, serde_json::Value>>,

    /// Name patterns to keep (`*` and `?` wildcards).
    #[serde(
        default,
        rename = "include",
        alias = "includedModels",
        alias = "includedServers",
        skip_serializing_if = "Option::is_none"
    )]
    pub included: Option<Vec<String>>,

    /// Name patterns to drop, applied after `included`.
    #[serde(
        default,
        rename = "exclude",
        alias = "excludedModels",
        alias = "excludedServers",
        skip_serializing_if = "Option::is_none"
    )]
    pub excluded: Option<Vec<String>>,

    /// Absolute path of the config file that supplied the properties.
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

impl SourceDefinition {
    /// Create a minimal definition.
    pub fn new(id: impl Into<String>, source_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_type: source_type.into(),
            ..Self::default()
        }
    }

    /// Whether the source is enabled (unset counts as enabled).
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Labels, empty when unset.
    pub fn labels(&self) -> &[String] {
        self.labels.as_deref().unwrap_or(&[])
    }

    /// Overlay `other` onto `self`.
    ///
    /// Only fields that are set (non-empty) in `other` win. The origin moves
    /// together with the properties so that relative paths keep resolving
    /// against the file that declared them.
    pub fn merge_from(&mut self, other: &Self) {
        if !other.id.is_empty() {
            self.id.clone_from(&other.id);
        }
        if !other.name.is_empty() {
            self.name.clone_from(&other.name);
        }
        if !other.source_type.is_empty() {
            self.source_type.clone_from(&other.source_type);
        }
        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
        if other.labels.as_ref().is_some_and(|l| !l.is_empty()) {
            self.labels.clone_from(&other.labels);
        }
        if other.properties.as_ref().is_some_and(|p| !p.is_empty()) {
            self.properties.clone_from(&other.properties);
            if other.origin.is_some() {
                self.origin.clone_from(&other.origin);
            }
        }
        if other.included.as_ref().is_some_and(|p| !p.is_empty()) {
            self.included.clone_from(&other.included);
        }
        if other.excluded.as_ref().is_some_and(|p| !p.is_empty()) {
            self.excluded.clone_from(&other.excluded);
        }
        if self.origin.is_none() {
            self.origin.clone_from(&other.origin);
        }
    }

    /// Fill in defaults for unset fields.
    pub fn apply_defaults(&mut self) {
        if self.enabled.is_none() {
            self.enabled = Some(true);
        }
        if self.labels.is_none() {
            self.labels = Some(Vec::new());
        }
    }

    /// A string property, if present and a string.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(serde_json::Value::as_str)
    }

    /// A boolean property; accepts `true`/`false` and their string forms.
    pub fn property_bool(&self, key: &str) -> Option<bool> {
        match self.properties.as_ref()?.get(key)? {
            serde_json::Value::Bool(b) => Some(*b),
            serde_json::Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Resolve a path-valued property against the origin's directory.
    ///
    /// Absolute values are returned unchanged.
    pub fn resolve_path_property(&self, key: &str) -> Option<PathBuf> {
        let raw = Path::new(self.property_str(key)?);
        if raw.is_absolute() {
            return Some(raw.to_path_buf());
        }
        let base = self.origin.as_deref().and_then(Path::parent);
        Some(base.map_or_else(|| raw.to_path_buf(), |dir| dir.join(raw)))
    }
}

/// Outcome of the last load of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceState {
    Available,
    PartiallyAvailable,
    Error,
    Disabled,
}

impl SourceState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::PartiallyAvailable => "partially-available",
            Self::Error => "error",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "partially-available" => Ok(Self::PartiallyAvailable),
            "error" => Ok(Self::Error),
            "disabled" => Ok(Self::Disabled),
            other => Err(format!("Unknown source state: {other}")),
        }
    }
}

/// Persisted status of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub source_id: String,
    pub state: SourceState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SourceStatus {
    fn with_state(source_id: &str, state: SourceState, error: Option<String>) -> Self {
        Self {
            source_id: source_id.to_string(),
            state,
            error,
            updated_at: Utc::now(),
        }
    }

    pub fn available(source_id: &str) -> Self {
        Self::with_state(source_id, SourceState::Available, None)
    }

    pub fn partially_available(source_id: &str, error: impl Into<String>) -> Self {
        Self::with_state(
            source_id,
            SourceState::PartiallyAvailable,
            Some(error.into()),
        )
    }

    pub fn error(source_id: &str, error: impl Into<String>) -> Self {
        Self::with_state(source_id, SourceState::Error, Some(error.into()))
    }

    pub fn disabled(source_id: &str) -> Self {
        Self::with_state(source_id, SourceState::Disabled, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SourceDefinition {
        let mut props = BTreeMap::new();
        props.insert(
            "yamlCatalogPath".to_string(),
            serde_json::Value::String("models.yaml".to_string()),
        );
        SourceDefinition {
            id: "hf".to_string(),
            name: "Hugging Face".to_string(),
            source_type: "yaml".to_string(),
            enabled: Some(false),
            labels: Some(vec!["public".to_string()]),
            properties: Some(props),
            origin: Some(PathBuf::from("/etc/catalog/base.yaml")),
            ..SourceDefinition::default()
        }
    }

    #[test]
    fn test_sparse_override_only_changes_set_fields() {
        let mut merged = base();
        let overlay = SourceDefinition {
            id: "hf".to_string(),
            enabled: Some(true),
            origin: Some(PathBuf::from("/home/user/override.yaml")),
            ..SourceDefinition::default()
        };

        merged.merge_from(&overlay);

        assert!(merged.is_enabled());
        assert_eq!(merged.name, "Hugging Face");
        assert_eq!(merged.source_type, "yaml");
        assert_eq!(merged.labels(), ["public".to_string()]);
        // Properties were not overridden, so paths still resolve next to the base file.
        assert_eq!(merged.origin, Some(PathBuf::from("/etc/catalog/base.yaml")));
    }

    #[test]
    fn test_empty_collections_are_not_set() {
        let mut merged = base();
        let overlay = SourceDefinition {
            labels: Some(Vec::new()),
            properties: Some(BTreeMap::new()),
            ..SourceDefinition::default()
        };

        merged.merge_from(&overlay);

        assert_eq!(merged.labels(), ["public".to_string()]);
        assert!(merged.property_str("yamlCatalogPath").is_some());
    }

    #[test]
    fn test_properties_override_moves_origin() {
        let mut merged = base();
        let mut props = BTreeMap::new();
        props.insert(
            "yamlCatalogPath".to_string(),
            serde_json::Value::String("mine.yaml".to_string()),
        );
        let overlay = SourceDefinition {
            properties: Some(props),
            origin: Some(PathBuf::from("/home/user/override.yaml")),
            ..SourceDefinition::default()
        };

        merged.merge_from(&overlay);

        assert_eq!(
            merged.resolve_path_property("yamlCatalogPath"),
            Some(PathBuf::from("/home/user/mine.yaml"))
        );
    }

    #[test]
    fn test_apply_defaults() {
        let mut def = SourceDefinition::new("a", "yaml");
        assert!(def.labels.is_none());

        def.apply_defaults();

        assert_eq!(def.enabled, Some(true));
        assert_eq!(def.labels, Some(Vec::new()));
    }

    #[test]
    fn test_deserialize_with_aliases() {
        let yaml = r"
id: hf
name: Hugging Face
type: yaml
includedModels: ['granite-*']
properties:
  yamlCatalogPath: models.yaml
  watch: 'true'
";
        let def: SourceDefinition = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(def.source_type, "yaml");
        assert_eq!(def.included, Some(vec!["granite-*".to_string()]));
        assert_eq!(def.property_bool("watch"), Some(true));
        assert!(def.enabled.is_none());
    }

    #[test]
    fn test_source_state_round_trip() {
        for state in [
            SourceState::Available,
            SourceState::PartiallyAvailable,
            SourceState::Error,
            SourceState::Disabled,
        ] {
            assert_eq!(state.as_str().parse::<SourceState>(), Ok(state));
        }
        assert!("bogus".parse::<SourceState>().is_err());
    }
}
