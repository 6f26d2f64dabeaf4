//! Repository implementations using `SQLite`.
//!
//! These implementations encapsulate all SQL queries and database access.
//! The `SqlitePool` is confined to this module and never exposed through
//! the port trait signatures.

mod row_mappers;
mod sqlite_mcp_repository;
mod sqlite_mcp_tool_repository;
mod sqlite_model_repository;
mod sqlite_source_status_repository;

pub use sqlite_mcp_repository::SqliteMcpRepository;
pub use sqlite_mcp_tool_repository::SqliteMcpToolRepository;
pub use sqlite_model_repository::SqliteModelRepository;
pub use sqlite_source_status_repository::SqliteSourceStatusRepository;
