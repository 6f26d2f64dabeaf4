//! MCP loader passes, using the built-in YAML providers.

mod common;

use std::path::Path;
use std::sync::Arc;

use catalog_core::{
    ListOptions, McpServerRecord, McpServerRepository, McpToolRepository, Model, SourceState,
    SourceStatusRepository,
};
use catalog_db::TestDb;
use catalog_sync::provider::{ProviderRegistry, register_yaml_providers};
use catalog_sync::{Loader, McpKind};
use common::{Script, Scripts, failed, server, write_file};
use tokio_util::sync::CancellationToken;

fn yaml_registry() -> Arc<ProviderRegistry<McpServerRecord>> {
    let models: ProviderRegistry<Model> = ProviderRegistry::new();
    let mcp = ProviderRegistry::new();
    register_yaml_providers(&models, &mcp).unwrap();
    Arc::new(mcp)
}

fn loader(db: &TestDb, providers: Arc<ProviderRegistry<McpServerRecord>>, config: &Path) -> Loader<McpKind> {
    let repos = db.repos();
    let loader = Loader::new(
        McpKind::from_repos(&repos),
        providers,
        repos.source_statuses,
        vec![config.to_path_buf()],
    );
    loader.parse_all_configs().unwrap();
    loader.state().set_leader(true);
    loader
}

async fn run_pass(loader: &Loader<McpKind>) {
    let all_known = loader.configured_source_ids();
    loader
        .perform_leader_operations(&CancellationToken::new(), &all_known)
        .await
        .unwrap();
}

/// Composite names of a source's servers with their tool names.
async fn stored(db: &TestDb, source_id: &str) -> Vec<(String, Vec<String>)> {
    let servers = db
        .mcp_repository()
        .list(&ListOptions::for_source(source_id))
        .await
        .unwrap()
        .items;
    let tools = db.mcp_tool_repository();

    let mut out = Vec::new();
    for server in servers {
        let mut names: Vec<String> = tools
            .list_by_parent_id(server.id.unwrap())
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        names.sort();
        out.push((server.composite_name().unwrap(), names));
    }
    out.sort();
    out
}

const SOURCES: &str = r"
mcpSources:
  - id: tools
    name: Tool servers
    type: yaml
    properties:
      yamlCatalogPath: servers.yaml
";

#[tokio::test]
async fn test_removed_server_and_its_tools_are_deleted() {
    let db = TestDb::new().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let catalog = write_file(
        dir.path(),
        "servers.yaml",
        r"
mcp_servers:
  - name: github
    version: '1.0'
    tools:
      - name: create_issue
      - name: list_repos
  - name: filesystem
    tools:
      - name: read_file
",
    );
    let config = write_file(dir.path(), "sources.yaml", SOURCES);
    let loader = loader(&db, yaml_registry(), &config);

    run_pass(&loader).await;
    assert_eq!(
        stored(&db, "tools").await,
        vec![
            ("filesystem".to_string(), vec!["read_file".to_string()]),
            (
                "github@1.0".to_string(),
                vec!["create_issue".to_string(), "list_repos".to_string()]
            ),
        ]
    );

    std::fs::write(
        &catalog,
        "mcp_servers:\n  - name: filesystem\n    tools:\n      - name: read_file\n      - name: write_file\n",
    )
    .unwrap();
    run_pass(&loader).await;

    assert_eq!(
        stored(&db, "tools").await,
        vec![(
            "filesystem".to_string(),
            vec!["read_file".to_string(), "write_file".to_string()]
        )]
    );
    assert!(
        db.mcp_repository()
            .get_by_name_and_version("github", "1.0")
            .await
            .is_err()
    );
    let status = db
        .source_status_repository()
        .get_by_source_id("tools")
        .await
        .unwrap();
    assert_eq!(status.state, SourceState::Available);
}

#[tokio::test]
async fn test_invalid_identities_are_reported_not_written() {
    let db = TestDb::new().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    write_file(
        dir.path(),
        "servers.yaml",
        &format!(
            "mcp_servers:\n  - name: ok\n  - name: 'bad@name'\n  - name: long\n    version: '{}'\n  - name: '{}'\n",
            "1".repeat(101),
            "b".repeat(256)
        ),
    );
    let config = write_file(dir.path(), "sources.yaml", SOURCES);
    let loader = loader(&db, yaml_registry(), &config);

    run_pass(&loader).await;

    assert_eq!(stored(&db, "tools").await.len(), 1);
    let status = db
        .source_status_repository()
        .get_by_source_id("tools")
        .await
        .unwrap();
    assert_eq!(status.state, SourceState::PartiallyAvailable);
    let error = status.error.unwrap();
    assert!(error.contains("3 failed"));
    assert!(error.contains("bad@name"));
}

#[tokio::test]
async fn test_missing_catalog_file_is_source_error() {
    let db = TestDb::new().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(dir.path(), "sources.yaml", SOURCES);
    let loader = loader(&db, yaml_registry(), &config);

    run_pass(&loader).await;

    let status = db
        .source_status_repository()
        .get_by_source_id("tools")
        .await
        .unwrap();
    assert_eq!(status.state, SourceState::Error);
    assert!(status.error.unwrap().contains("servers.yaml"));
}

#[tokio::test]
async fn test_disabled_source_tools_are_removed_first() {
    let db = TestDb::new().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let scripts = Scripts::new();
    scripts.set("s", Script::new(vec![server("slack", "2", &["post", "read"])]));
    let config = write_file(
        dir.path(),
        "sources.yaml",
        "mcpSources:\n  - id: s\n    type: scripted\n",
    );
    let loader = loader(&db, scripts.registry(), &config);
    run_pass(&loader).await;
    assert_eq!(stored(&db, "s").await.len(), 1);

    std::fs::write(
        &config,
        "mcpSources:\n  - id: s\n    type: scripted\n    enabled: false\n",
    )
    .unwrap();
    loader.reload_parsing();
    run_pass(&loader).await;

    assert!(stored(&db, "s").await.is_empty());
    let status = db
        .source_status_repository()
        .get_by_source_id("s")
        .await
        .unwrap();
    assert_eq!(status.state, SourceState::Disabled);
}

#[tokio::test]
async fn test_all_failed_mcp_source() {
    let db = TestDb::new().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let scripts = Scripts::new();
    scripts.set("s", Script::new(vec![failed("x"), failed("y")]));
    let config = write_file(
        dir.path(),
        "sources.yaml",
        "mcpSources:\n  - id: s\n    type: scripted\n",
    );
    let loader = loader(&db, scripts.registry(), &config);

    run_pass(&loader).await;

    assert!(stored(&db, "s").await.is_empty());
    let status = db
        .source_status_repository()
        .get_by_source_id("s")
        .await
        .unwrap();
    assert_eq!(status.state, SourceState::Error);
}

#[tokio::test]
async fn test_server_whose_tools_fail_is_dropped_from_the_source() {
    let db = TestDb::new().await.unwrap();
    let dir = tempfile::tempdir().unwrap();
    let scripts = Scripts::new();
    scripts.set(
        "s",
        Script::new(vec![
            server("github", "1.0", &["create_issue"]),
            server("fs", "", &["read_file"]),
        ]),
    );
    let config = write_file(
        dir.path(),
        "sources.yaml",
        "mcpSources:\n  - id: s\n    type: scripted\n",
    );
    let loader = loader(&db, scripts.registry(), &config);
    run_pass(&loader).await;
    assert_eq!(stored(&db, "s").await.len(), 2);

    scripts.set(
        "s",
        Script::new(vec![
            server("github", "1.0", &["dup", "dup"]),
            server("fs", "", &["read_file"]),
        ]),
    );
    run_pass(&loader).await;

    assert_eq!(
        stored(&db, "s").await,
        vec![("fs".to_string(), vec!["read_file".to_string()])]
    );
    let status = db
        .source_status_repository()
        .get_by_source_id("s")
        .await
        .unwrap();
    assert_eq!(status.state, SourceState::PartiallyAvailable);
    assert!(status.error.unwrap().contains("github@1.0"));
}
