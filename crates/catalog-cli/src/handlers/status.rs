//! `status` command handler.

use std::path::Path;

use anyhow::Result;
use catalog_core::SourceStatus;

use crate::bootstrap::open_repos;

/// Print every persisted source status.
pub async fn execute(db: &Path) -> Result<()> {
    let repos = open_repos(db).await?;
    let statuses = repos.source_statuses.get_all().await?;

    if statuses.is_empty() {
        println!("No source statuses recorded.");
        return Ok(());
    }

    println!("{:<28} {:<20} {:<26} ERROR", "SOURCE", "STATE", "UPDATED");
    for status in &statuses {
        println!("{}", format_row(status));
    }
    Ok(())
}

fn format_row(status: &SourceStatus) -> String {
    format!(
        "{:<28} {:<20} {:<26} {}",
        status.source_id,
        status.state.as_str(),
        status.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        status.error.as_deref().unwrap_or("-")
    )
}
