//! Error types for the sync engine.

use std::path::PathBuf;

use catalog_core::RepositoryError;
use thiserror::Error;

/// Message carried by every [`PartiallyAvailableError`].
pub const PARTIALLY_AVAILABLE: &str = "some items failed to load";

/// Errors from reading or validating one sources config file.
///
/// Every variant names the file it came from.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("Invalid configuration in {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(path: &std::path::Path, message: impl Into<String>) -> Self {
        Self::Invalid {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Errors from the provider registry and provider construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Provider type '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("No provider registered for type '{0}'")]
    UnknownType(String),

    #[error("Source '{source_id}' is missing required property '{property}'")]
    MissingProperty { source_id: String, property: String },

    #[error("Source '{source_id}': {message}")]
    Construction { source_id: String, message: String },
}

/// Some, but not all, items of a source loaded.
///
/// The source stays active; callers are expected to surface this rather
/// than treat it as a failure. Use [`LoaderError::is_partially_available`]
/// to tell it apart from other loader errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{msg}: {count} failed", msg = PARTIALLY_AVAILABLE, count = .failed_items.len())]
pub struct PartiallyAvailableError {
    /// Identifiers of the items that failed.
    pub failed_items: Vec<String>,
}

/// Errors surfaced by loaders and the supervisor.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    PartiallyAvailable(#[from] PartiallyAvailableError),

    #[error("All {count} items from source '{source_id}' failed to load: {details}")]
    AllFailed {
        source_id: String,
        count: usize,
        details: String,
    },

    #[error("File watchers are already running")]
    WatchersAlreadyRunning,

    #[error("Failed to watch {}: {message}", path.display())]
    Watch { path: PathBuf, message: String },

    #[error("Loader task failed: {0}")]
    Task(String),
}

impl LoaderError {
    /// Whether this is the non-fatal partial availability outcome.
    pub const fn is_partially_available(&self) -> bool {
        matches!(self, Self::PartiallyAvailable(_))
    }
}
