//! Catalog synchronization engine.
//!
//! Merges catalog source configuration from several files, streams every
//! enabled source through its provider, and keeps storage in line with
//! what the sources report, writing only while this replica is leader.
//!
//! The main entry points are [`CatalogSync`], which drives both catalog
//! kinds from a leadership signal, and [`Loader`], which runs the passes of
//! a single kind.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod kind;
pub mod loader;
pub mod provider;
pub mod sources;
pub mod state;
pub mod supervisor;
pub mod watch;

pub use config::{SourceKind, SourcesConfig, read_sources_config, read_sources_configs};
pub use error::{ConfigError, LoaderError, PartiallyAvailableError, ProviderError};
pub use kind::{CatalogKind, McpKind, ModelKind, RecordHandler};
pub use loader::{Loader, LoaderOptions};
pub use provider::{
    Provider, ProviderFactory, ProviderRegistry, Record, mcp_providers, model_providers,
    register_builtin_providers,
};
pub use sources::SourceCollection;
pub use state::BaseLoaderState;
pub use supervisor::{CatalogSync, SyncOptions};
