//! Top-level argument parsing.

use clap::Parser;

use crate::commands::Commands;

/// Keep a catalog database in line with its configured sources.
#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(about = "Synchronize model and MCP server catalogs from configured sources")]
#[command(version)]
pub struct Cli {
    /// Enable debug output when `RUST_LOG` is unset
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Log filter used when `RUST_LOG` is not set.
    pub const fn default_log_filter(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args() {
        let cli = Cli::parse_from([
            "catalog-sync",
            "run",
            "--db",
            "/tmp/catalog.db",
            "--model-config",
            "a.yaml,b.yaml",
            "--mcp-config",
            "mcp.yaml",
            "--standby",
            "--drain-timeout-secs",
            "3",
        ]);

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.db, PathBuf::from("/tmp/catalog.db"));
        assert_eq!(
            args.configs.model_config,
            vec![PathBuf::from("a.yaml"), PathBuf::from("b.yaml")]
        );
        assert_eq!(args.configs.mcp_config, vec![PathBuf::from("mcp.yaml")]);
        assert!(args.standby);
        assert!(!args.watch);
        assert_eq!(args.drain_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["catalog-sync", "status", "--db", "x.db", "-v"]);
        assert!(cli.verbose);
        assert_eq!(cli.default_log_filter(), "debug");
    }
}
