//! Core domain types and port definitions for the catalog sync engine.
//!
//! This crate has no I/O. Storage adapters implement the traits in
//! [`ports`], and the sync engine only ever talks to those traits.

#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod ports;

// Re-export commonly used types for convenience
pub use domain::{
    IdentityError, McpServer, McpServerRecord, McpServerTool, Model, Property, PropertyValue,
    SOURCE_ID_PROPERTY, ServerIdentity, SourceDefinition, SourceState, SourceStatus,
    get_property, set_property,
};
pub use ports::{
    ListOptions, McpServerRepository, McpToolRepository, ModelRepository, Page, Repos,
    RepositoryError, SourceStatusRepository,
};
