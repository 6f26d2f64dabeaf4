//! MCP server domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{IdentityError, ServerIdentity};
use crate::domain::property::{
    Property, PropertyValue, SOURCE_ID_PROPERTY, get_property, set_property,
};

/// An MCP tool server entry in the catalog.
///
/// Identity is the pair `base_name` + `version`; see [`ServerIdentity`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServer {
    /// Database ID (absent until persisted).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Server name without version.
    pub base_name: String,

    /// Server version; empty means unversioned.
    #[serde(default)]
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub properties: Vec<Property>,
}

impl McpServer {
    /// Create a server with the given identity parts.
    pub fn new(base_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set (or replace) a property.
    #[must_use]
    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        set_property(&mut self.properties, name, value);
        self
    }

    /// Validated identity of this server.
    pub fn identity(&self) -> Result<ServerIdentity, IdentityError> {
        ServerIdentity::new(&self.base_name, &self.version)
    }

    /// Storage-level composite name (`base_name@version`).
    pub fn composite_name(&self) -> Result<String, IdentityError> {
        self.identity().map(|id| id.composite())
    }

    /// The id of the source that produced this server, if stamped.
    pub fn source_id(&self) -> Option<&str> {
        get_property(&self.properties, SOURCE_ID_PROPERTY).and_then(PropertyValue::as_str)
    }

    /// Stamp the producing source id onto the property list.
    pub fn set_source_id(&mut self, source_id: &str) {
        set_property(&mut self.properties, SOURCE_ID_PROPERTY, source_id);
    }
}

/// A tool exposed by an MCP server.
///
/// Tools are child rows of a server and are always replaced as a whole
/// whenever the server is saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpServerTool {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Tool (function) name, unqualified.
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// JSON Schema for the tool's input parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<serde_json::Value>,

    #[serde(default)]
    pub properties: Vec<Property>,
}

impl McpServerTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// One server together with its full tool list, as emitted by providers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpServerRecord {
    pub server: McpServer,
    #[serde(default)]
    pub tools: Vec<McpServerTool>,
}

impl McpServerRecord {
    pub const fn new(server: McpServer, tools: Vec<McpServerTool>) -> Self {
        Self { server, tools }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_name_validates() {
        let server = McpServer::new("github", "1.0");
        assert_eq!(server.composite_name().unwrap(), "github@1.0");

        let bad = McpServer::new("git@hub", "1.0");
        assert!(matches!(
            bad.composite_name(),
            Err(IdentityError::BaseNameContainsSeparator(_))
        ));
    }

    #[test]
    fn test_record_serialization() {
        let record = McpServerRecord::new(
            McpServer::new("fs", "").with_description("Filesystem access"),
            vec![McpServerTool::new("read_file")],
        );
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"baseName\":\"fs\""));
        assert!(json.contains("\"name\":\"read_file\""));
    }
}
