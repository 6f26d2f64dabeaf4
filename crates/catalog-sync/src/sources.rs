//! Multi-origin table of source definitions.
//!
//! Each config file is one origin. Origins keep their registration order,
//! which is also their priority: when two origins define the same source id,
//! the later one wins field by field. The merged view is recomputed on every
//! read, so readers never see a stale fold after a reparse.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use catalog_core::SourceDefinition;

/// Label that selects sources without any label.
pub const NULL_LABEL: &str = "null";

struct OriginEntry {
    origin: PathBuf,
    sources: Vec<SourceDefinition>,
}

/// Source definitions of one catalog kind, grouped by origin.
#[derive(Default)]
pub struct SourceCollection {
    origins: RwLock<Vec<OriginEntry>>,
}

impl SourceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contribution of `origin`.
    ///
    /// An origin seen for the first time is appended and thereby gets the
    /// highest priority so far.
    pub fn merge(&self, origin: impl Into<PathBuf>, sources: Vec<SourceDefinition>) {
        let origin = origin.into();
        let mut origins = self.origins.write().unwrap_or_else(PoisonError::into_inner);
        match origins.iter_mut().find(|entry| entry.origin == origin) {
            Some(entry) => entry.sources = sources,
            None => origins.push(OriginEntry { origin, sources }),
        }
    }

    /// The merged, defaulted view keyed by source id.
    ///
    /// The returned map is an independent copy.
    pub fn all_sources(&self) -> BTreeMap<String, SourceDefinition> {
        let origins = self.origins.read().unwrap_or_else(PoisonError::into_inner);

        let mut merged: BTreeMap<String, SourceDefinition> = BTreeMap::new();
        for entry in origins.iter() {
            for source in &entry.sources {
                merged
                    .entry(source.id.clone())
                    .and_modify(|existing| existing.merge_from(source))
                    .or_insert_with(|| source.clone());
            }
        }
        drop(origins);

        for source in merged.values_mut() {
            source.apply_defaults();
        }
        merged
    }

    /// An enabled source by id.
    pub fn get(&self, id: &str) -> Option<SourceDefinition> {
        self.all_sources()
            .remove(id)
            .filter(SourceDefinition::is_enabled)
    }

    /// Enabled sources carrying any of `labels`.
    ///
    /// [`NULL_LABEL`] matches sources that have no labels at all.
    pub fn by_label<S: AsRef<str>>(
        &self,
        labels: &[S],
        case_insensitive: bool,
    ) -> Vec<SourceDefinition> {
        let label_eq = |wanted: &str, have: &str| {
            if case_insensitive {
                wanted.eq_ignore_ascii_case(have)
            } else {
                wanted == have
            }
        };

        self.all_sources()
            .into_values()
            .filter(SourceDefinition::is_enabled)
            .filter(|source| {
                labels.iter().any(|wanted| {
                    let wanted = wanted.as_ref();
                    if label_eq(wanted, NULL_LABEL) {
                        source.labels().is_empty()
                    } else {
                        source.labels().iter().any(|have| label_eq(wanted, have))
                    }
                })
            })
            .collect()
    }

    /// Registered origins in priority order (lowest first).
    pub fn origins(&self) -> Vec<PathBuf> {
        self.origins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| entry.origin.clone())
            .collect()
    }

    /// Whether `origin` has contributed anything yet.
    pub fn has_origin(&self, origin: &Path) -> bool {
        self.origins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|entry| entry.origin == origin)
    }
}
