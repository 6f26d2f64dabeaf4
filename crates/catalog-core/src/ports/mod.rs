//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the sync engine expects from storage.
//! They contain no implementation details and use only domain types.
//!
//! # Design Rules
//!
//! - No `sqlx` types in any signature
//! - Traits are minimal: save, list, get, delete, and the two
//!   source-scoped helpers the reconciliation needs
//! - Child rows (MCP tools) get their own repository

pub mod mcp_repository;
pub mod model_repository;
pub mod source_status_repository;

use std::sync::Arc;
use thiserror::Error;

use crate::domain::IdentityError;

pub use mcp_repository::{McpServerRepository, McpToolRepository};
pub use model_repository::ModelRepository;
pub use source_status_repository::SourceStatusRepository;

/// Container for all repository trait objects.
///
/// This struct provides a consistent way to wire repositories across
/// adapters without coupling them to concrete implementations.
#[derive(Clone)]
pub struct Repos {
    /// Catalog model repository.
    pub models: Arc<dyn ModelRepository>,
    /// MCP server repository.
    pub mcp_servers: Arc<dyn McpServerRepository>,
    /// MCP tool repository (children of servers).
    pub mcp_tools: Arc<dyn McpToolRepository>,
    /// Per-source status records, shared by every catalog kind.
    pub source_statuses: Arc<dyn SourceStatusRepository>,
}

impl Repos {
    /// Create a new Repos container.
    pub fn new(
        models: Arc<dyn ModelRepository>,
        mcp_servers: Arc<dyn McpServerRepository>,
        mcp_tools: Arc<dyn McpToolRepository>,
        source_statuses: Arc<dyn SourceStatusRepository>,
    ) -> Self {
        Self {
            models,
            mcp_servers,
            mcp_tools,
            source_statuses,
        }
    }
}

/// Options for paged listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Only return entities stamped with this source id.
    pub source_id: Option<String>,
    /// Maximum page size; `None` returns everything.
    pub page_size: Option<u32>,
    /// Opaque cursor from a previous [`Page::next_page_token`].
    pub page_token: Option<String>,
}

impl ListOptions {
    /// List everything belonging to one source.
    pub fn for_source(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            ..Self::default()
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Domain-specific errors for repository operations.
///
/// This error type abstracts away storage implementation details (e.g., sqlx errors)
/// and provides a clean interface for services to handle storage failures.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// An entity with the same identifier already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A constraint was violated (e.g., foreign key, unique constraint).
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// The entity's identity failed validation; nothing was written.
    #[error(transparent)]
    InvalidIdentity(#[from] IdentityError),

    /// The entity is missing data the repository needs.
    #[error("Invalid entity: {0}")]
    Invalid(String),
}
