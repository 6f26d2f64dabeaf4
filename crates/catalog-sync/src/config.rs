//! Sources config files.
//!
//! One YAML file may declare model sources, MCP sources, named queries, and
//! label definitions:
//!
//! ```yaml
//! sources:
//!   - id: hf
//!     name: Hugging Face
//!     type: yaml
//!     properties:
//!       yamlCatalogPath: models.yaml
//! mcpSources:
//!   - id: tools
//!     type: yaml
//!     properties:
//!       yamlCatalogPath: mcp.yaml
//! namedQueries:
//!   small-models:
//!     parameterCount: { operator: "<", value: 8 }
//! labels:
//!   - name: public
//! ```
//!
//! `catalogs` and `mcp_catalogs` are accepted as deprecated spellings of the
//! two source lists and lose to the primary list on shared ids.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use catalog_core::SourceDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Operators accepted in named query filters.
pub const NAMED_QUERY_OPERATORS: &[&str] = &["=", "!=", ">", "<", ">=", "<=", "LIKE", "ILIKE", "IN"];

/// Which list of sources to read from a config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Model,
    Mcp,
}

impl SourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Mcp => "mcp",
        }
    }

    const fn primary_key(self) -> &'static str {
        match self {
            Self::Model => "sources",
            Self::Mcp => "mcpSources",
        }
    }

    const fn deprecated_key(self) -> &'static str {
        match self {
            Self::Model => "catalogs",
            Self::Mcp => "mcp_catalogs",
        }
    }
}

/// One parsed sources config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcesConfig {
    #[serde(default)]
    pub sources: Vec<SourceDefinition>,

    /// Deprecated spelling of `sources`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub catalogs: Vec<SourceDefinition>,

    #[serde(default)]
    pub mcp_sources: Vec<SourceDefinition>,

    /// Deprecated spelling of `mcpSources`.
    #[serde(default, rename = "mcp_catalogs", skip_serializing_if = "Vec::is_empty")]
    pub mcp_catalogs: Vec<SourceDefinition>,

    /// Query name -> property -> `{ operator, value }`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_queries: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Value>,

    /// Absolute path this config was read from.
    #[serde(skip)]
    pub path: PathBuf,
}

impl SourcesConfig {
    /// Parse a config from YAML text. `path` is used for error context and
    /// becomes the origin of every definition.
    pub fn from_yaml(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if text.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(text).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        };

        config.path = path.to_path_buf();
        for source in config
            .sources
            .iter_mut()
            .chain(config.catalogs.iter_mut())
            .chain(config.mcp_sources.iter_mut())
            .chain(config.mcp_catalogs.iter_mut())
        {
            source.origin = Some(path.to_path_buf());
        }

        config.validate()?;
        Ok(config)
    }

    fn lists(&self, kind: SourceKind) -> (&[SourceDefinition], &[SourceDefinition]) {
        match kind {
            SourceKind::Model => (self.sources.as_slice(), self.catalogs.as_slice()),
            SourceKind::Mcp => (self.mcp_sources.as_slice(), self.mcp_catalogs.as_slice()),
        }
    }

    /// Sources of `kind`, with the primary list overriding the deprecated one.
    pub fn sources_for(&self, kind: SourceKind) -> Vec<SourceDefinition> {
        let (primary, deprecated) = self.lists(kind);

        let mut merged: Vec<SourceDefinition> = deprecated.to_vec();
        for source in primary {
            match merged.iter_mut().find(|existing| existing.id == source.id) {
                Some(existing) => existing.merge_from(source),
                None => merged.push(source.clone()),
            }
        }
        merged
    }

    /// Names of the declared labels.
    pub fn label_names(&self) -> Vec<&str> {
        self.labels
            .iter()
            .filter_map(|label| label.get("name").and_then(Value::as_str))
            .collect()
    }

    /// Check ids, named queries, labels, and name patterns.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in [SourceKind::Model, SourceKind::Mcp] {
            let (primary, deprecated) = self.lists(kind);
            self.validate_list(kind.primary_key(), primary)?;
            self.validate_list(kind.deprecated_key(), deprecated)?;
        }
        self.validate_named_queries()?;
        self.validate_labels()
    }

    fn validate_list(&self, key: &str, sources: &[SourceDefinition]) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for (index, source) in sources.iter().enumerate() {
            if source.id.trim().is_empty() {
                return Err(ConfigError::invalid(
                    &self.path,
                    format!("{key}[{index}] has no id"),
                ));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::invalid(
                    &self.path,
                    format!("duplicate source id '{}' in {key}", source.id),
                ));
            }

            let patterns = source
                .included
                .iter()
                .flatten()
                .chain(source.excluded.iter().flatten());
            for pattern in patterns {
                if pattern.is_empty() || pattern.trim() != pattern {
                    return Err(ConfigError::invalid(
                        &self.path,
                        format!("source '{}' has invalid name pattern '{pattern}'", source.id),
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_named_queries(&self) -> Result<(), ConfigError> {
        for (name, query) in &self.named_queries {
            let Some(filters) = query.as_object() else {
                return Err(ConfigError::invalid(
                    &self.path,
                    format!("named query '{name}' must map properties to filters"),
                ));
            };

            for (property, filter) in filters {
                let operator = filter
                    .get("operator")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        ConfigError::invalid(
                            &self.path,
                            format!("named query '{name}' property '{property}' has no operator"),
                        )
                    })?;
                if !NAMED_QUERY_OPERATORS.contains(&operator) {
                    return Err(ConfigError::invalid(
                        &self.path,
                        format!(
                            "named query '{name}' property '{property}' has unknown operator '{operator}'"
                        ),
                    ));
                }

                let value = filter.get("value").ok_or_else(|| {
                    ConfigError::invalid(
                        &self.path,
                        format!("named query '{name}' property '{property}' has no value"),
                    )
                })?;
                if operator == "IN" && !value.is_array() {
                    return Err(ConfigError::invalid(
                        &self.path,
                        format!("named query '{name}' property '{property}' needs a list for IN"),
                    ));
                }
            }
        }
        Ok(())
    }

    fn validate_labels(&self) -> Result<(), ConfigError> {
        for (index, label) in self.labels.iter().enumerate() {
            if !label.is_object() {
                return Err(ConfigError::invalid(
                    &self.path,
                    format!("labels[{index}] must be a map"),
                ));
            }
            match label.get("name") {
                Some(Value::String(name)) if !name.trim().is_empty() => {}
                _ => {
                    return Err(ConfigError::invalid(
                        &self.path,
                        format!("labels[{index}] needs a non-empty string name"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Read and validate one sources config file.
pub fn read_sources_config(path: &Path) -> Result<SourcesConfig, ConfigError> {
    let read_err = |source: std::io::Error| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    };
    let absolute = std::fs::canonicalize(path).map_err(read_err)?;
    let text = std::fs::read_to_string(&absolute).map_err(read_err)?;
    SourcesConfig::from_yaml(&absolute, &text)
}

/// Strictly read every file in `paths`, in order, keeping the sources of `kind`.
///
/// Each entry pairs a file's canonical path with its sources, ready for
/// [`SourceCollection::merge`](crate::SourceCollection::merge). The first
/// unreadable or invalid file fails the whole read.
pub fn read_sources_configs(
    paths: &[PathBuf],
    kind: SourceKind,
) -> Result<Vec<(PathBuf, Vec<SourceDefinition>)>, ConfigError> {
    paths
        .iter()
        .map(|path| {
            let config = read_sources_config(path)?;
            let sources = config.sources_for(kind);
            Ok((config.path, sources))
        })
        .collect()
}
