//! Core domain types.
//!
//! These types represent the pure domain model, independent of any
//! infrastructure concerns (database, filesystem, etc.).
//!
//! # Structure
//!
//! - `property` - Typed property bag shared by every catalog entity
//! - `model` - Catalog model entries
//! - `mcp` - MCP servers, their tools, and composite server identity
//! - `source` - Source definitions and persisted per-source status

pub mod mcp;
mod model;
mod property;
mod source;

pub use mcp::{IdentityError, McpServer, McpServerRecord, McpServerTool, ServerIdentity};
pub use model::Model;
pub use property::{Property, PropertyValue, SOURCE_ID_PROPERTY, get_property, set_property};
pub use source::{SourceDefinition, SourceState, SourceStatus};
