//! MCP (Model Context Protocol) server catalog types.
//!
//! # Design
//!
//! - `McpServer` - A catalog server entry, identified by base name + version
//! - `McpServerTool` - A tool exposed by a server (child entity)
//! - `McpServerRecord` - A server plus its complete tool list
//! - `ServerIdentity` - Validated composite identity (`base_name@version`)

pub mod identity;
mod types;

pub use identity::{IdentityError, ServerIdentity};
pub use types::{McpServer, McpServerRecord, McpServerTool};
