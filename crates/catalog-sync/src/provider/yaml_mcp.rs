//! YAML file provider for MCP sources.
//!
//! ```yaml
//! mcp_servers:
//!   - name: github
//!     version: "1.2.0"
//!     description: GitHub API access
//!     tools:
//!       - name: create_issue
//!         description: Open an issue
//!         inputSchema: { type: object }
//! ```
//!
//! The file is read once per pass; the channel closes after the last entry.

use std::collections::BTreeMap;

use catalog_core::{McpServer, McpServerRecord, McpServerTool, SourceDefinition};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{
    NameFilter, PROVIDER_CHANNEL_CAPACITY, Provider, Record, catalog_path, properties_from_map,
    read_catalog, send_batch,
};
use crate::error::ProviderError;

#[derive(Debug, Deserialize)]
struct McpCatalogFile {
    #[serde(default)]
    mcp_servers: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerEntry {
    #[serde(default)]
    name: String,
    /// Numbers are accepted since YAML reads `1.0` as a float.
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    #[serde(default)]
    tools: Vec<ToolEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_schema: Option<Value>,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
}

/// Streams the MCP servers listed in a YAML file.
pub struct YamlMcpProvider {
    records: Vec<Record<McpServerRecord>>,
}

impl YamlMcpProvider {
    /// Build the provider for `source`, reading and validating its file.
    pub fn from_source(source: &SourceDefinition) -> Result<Self, ProviderError> {
        let path = catalog_path(source)?;
        let text = read_catalog(source, &path)?;
        let records = parse_catalog(&text, &NameFilter::from_source(source)).map_err(|message| {
            ProviderError::Construction {
                source_id: source.id.clone(),
                message: format!("failed to parse {}: {message}", path.display()),
            }
        })?;
        Ok(Self { records })
    }
}

impl Provider<McpServerRecord> for YamlMcpProvider {
    fn emit(self: Box<Self>, cancel: CancellationToken) -> mpsc::Receiver<Record<McpServerRecord>> {
        let (tx, rx) = mpsc::channel(PROVIDER_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            send_batch(&tx, &cancel, self.records).await;
        });
        rx
    }
}

fn version_string(version: Option<&Value>) -> String {
    match version {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn parse_catalog(
    text: &str,
    filter: &NameFilter,
) -> Result<Vec<Record<McpServerRecord>>, String> {
    let file: McpCatalogFile = if text.trim().is_empty() {
        McpCatalogFile {
            mcp_servers: Vec::new(),
        }
    } else {
        serde_yaml_ng::from_str(text).map_err(|e| e.to_string())?
    };

    let mut records = Vec::with_capacity(file.mcp_servers.len());
    for (index, raw) in file.mcp_servers.into_iter().enumerate() {
        let label = match raw.get("name").and_then(Value::as_str) {
            Some(name) => match version_string(raw.get("version")).as_str() {
                "" => name.to_string(),
                version => format!("{name}@{version}"),
            },
            None => format!("mcp_servers[{index}]"),
        };

        let entry: ServerEntry = match serde_json::from_value(raw) {
            Ok(entry) => entry,
            Err(e) => {
                records.push(Record::Failed {
                    item: label,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let mut server = McpServer::new(entry.name, version_string(entry.version.as_ref()));
        let identity = match server.identity() {
            Ok(identity) => identity,
            Err(e) => {
                records.push(Record::Failed {
                    item: label,
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !filter.allows(identity.base_name()) {
            continue;
        }

        server.base_name = identity.base_name().to_string();
        server.version = identity.version().to_string();
        server.description = entry.description;
        server.external_id = entry.external_id;
        server.properties = properties_from_map(&entry.properties);

        let tools = entry
            .tools
            .into_iter()
            .map(|tool| McpServerTool {
                description: tool.description,
                input_schema: tool.input_schema,
                properties: properties_from_map(&tool.properties),
                ..McpServerTool::new(tool.name)
            })
            .collect();

        records.push(Record::Item(McpServerRecord::new(server, tools)));
    }
    Ok(records)
}
