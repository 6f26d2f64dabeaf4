//! Composite identity for MCP servers.
//!
//! A server is identified by `base_name` + `version`. Storage keeps a single
//! composite name: `base_name@version`, or just `base_name` when the version
//! is empty. Neither part may contain the separator, which keeps the encoding
//! reversible.

use thiserror::Error;

/// Separator between base name and version in the composite name.
pub const COMPOSITE_SEPARATOR: char = '@';

/// Separator between the server composite name and a tool name.
pub const TOOL_SEPARATOR: char = ':';

/// Maximum base name length, in characters.
pub const MAX_BASE_NAME_LEN: usize = 255;

/// Maximum version length, in characters.
pub const MAX_VERSION_LEN: usize = 100;

/// Validation failures for a server's two-part identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("MCP server base name cannot be empty")]
    EmptyBaseName,

    #[error("MCP server base name is {0} characters, maximum is {max}", max = MAX_BASE_NAME_LEN)]
    BaseNameTooLong(usize),

    #[error("MCP server base name cannot contain '{sep}': {0}", sep = COMPOSITE_SEPARATOR)]
    BaseNameContainsSeparator(String),

    #[error("MCP server version is {0} characters, maximum is {max}", max = MAX_VERSION_LEN)]
    VersionTooLong(usize),

    #[error("MCP server version cannot contain '{sep}': {0}", sep = COMPOSITE_SEPARATOR)]
    VersionContainsSeparator(String),
}

/// Normalized, validated `(base_name, version)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerIdentity {
    base_name: String,
    version: String,
}

impl ServerIdentity {
    /// Trim and validate both parts.
    pub fn new(base_name: &str, version: &str) -> Result<Self, IdentityError> {
        let base_name = base_name.trim();
        let version = version.trim();

        if base_name.is_empty() {
            return Err(IdentityError::EmptyBaseName);
        }
        let base_len = base_name.chars().count();
        if base_len > MAX_BASE_NAME_LEN {
            return Err(IdentityError::BaseNameTooLong(base_len));
        }
        if base_name.contains(COMPOSITE_SEPARATOR) {
            return Err(IdentityError::BaseNameContainsSeparator(
                base_name.to_string(),
            ));
        }

        let version_len = version.chars().count();
        if version_len > MAX_VERSION_LEN {
            return Err(IdentityError::VersionTooLong(version_len));
        }
        if version.contains(COMPOSITE_SEPARATOR) {
            return Err(IdentityError::VersionContainsSeparator(version.to_string()));
        }

        Ok(Self {
            base_name: base_name.to_string(),
            version: version.to_string(),
        })
    }

    /// Split a stored composite name back into its parts.
    ///
    /// Stored names were validated on the way in, so this never fails; a
    /// name without separator has an empty version.
    pub fn from_composite(composite: &str) -> Self {
        match composite.split_once(COMPOSITE_SEPARATOR) {
            Some((base, version)) => Self {
                base_name: base.to_string(),
                version: version.to_string(),
            },
            None => Self {
                base_name: composite.to_string(),
                version: String::new(),
            },
        }
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The storage-level name.
    pub fn composite(&self) -> String {
        if self.version.is_empty() {
            self.base_name.clone()
        } else {
            format!("{}{COMPOSITE_SEPARATOR}{}", self.base_name, self.version)
        }
    }

    /// Storage name of one of this server's tools.
    pub fn qualified_tool_name(&self, tool_name: &str) -> String {
        format!("{}{TOOL_SEPARATOR}{tool_name}", self.composite())
    }
}
