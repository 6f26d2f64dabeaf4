//! `validate` command handler.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use catalog_core::SourceDefinition;
use catalog_sync::{ProviderRegistry, SourceCollection, SourceKind, read_sources_configs};

use crate::bootstrap::register_providers;
use crate::commands::ConfigArgs;

/// Strictly parse every config file and print the merged sources.
///
/// Nothing is printed unless every file parses and validates.
pub fn execute(args: &ConfigArgs) -> Result<()> {
    register_providers()?;
    let models = merge_configs(&args.model_config, SourceKind::Model)?;
    let mcp = merge_configs(&args.mcp_config, SourceKind::Mcp)?;

    print_sources("Model sources", &models, &catalog_sync::model_providers());
    print_sources("MCP sources", &mcp, &catalog_sync::mcp_providers());
    Ok(())
}

/// Read `paths` in order and merge their sources of `kind`.
pub fn merge_configs(
    paths: &[PathBuf],
    kind: SourceKind,
) -> Result<BTreeMap<String, SourceDefinition>> {
    let collection = SourceCollection::new();
    for (origin, sources) in read_sources_configs(paths, kind)? {
        collection.merge(origin, sources);
    }
    Ok(collection.all_sources())
}

fn print_sources<E>(
    title: &str,
    sources: &BTreeMap<String, SourceDefinition>,
    providers: &Arc<ProviderRegistry<E>>,
) {
    println!("{title} ({}):", sources.len());
    for source in sources.values() {
        let known = providers.get(&source.source_type).is_some();
        println!(
            "  {:<24} type={}{} enabled={} origin={}",
            source.id,
            source.source_type,
            if known { "" } else { " (unregistered)" },
            source.is_enabled(),
            source
                .origin
                .as_ref()
                .map_or_else(|| "-".to_string(), |p| p.display().to_string())
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_configs_applies_overrides_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("base.yaml");
        let local = dir.path().join("local.yaml");
        std::fs::write(
            &base,
            "sources:\n  - id: hf\n    name: Hugging Face\n    type: yaml\nmcpSources:\n  - id: tools\n    type: yaml\n",
        )
        .unwrap();
        std::fs::write(&local, "sources:\n  - id: hf\n    enabled: false\n").unwrap();

        let models = merge_configs(&[base.clone(), local], SourceKind::Model).unwrap();
        let hf = &models["hf"];
        assert_eq!(hf.source_type, "yaml");
        assert!(!hf.is_enabled());

        let mcp = merge_configs(&[base], SourceKind::Mcp).unwrap();
        assert_eq!(mcp.keys().collect::<Vec<_>>(), vec!["tools"]);
    }

    #[test]
    fn test_merge_configs_rejects_duplicate_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dup.yaml");
        std::fs::write(&path, "sources:\n  - id: a\n  - id: a\n").unwrap();

        assert!(merge_configs(&[path], SourceKind::Model).is_err());
    }
}
