//! Subcommand definitions.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

/// Sources config files for both catalog kinds.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Model sources config files, merged in order
    #[arg(
        long = "model-config",
        env = "CATALOG_MODEL_CONFIG",
        value_delimiter = ','
    )]
    pub model_config: Vec<PathBuf>,

    /// MCP sources config files, merged in order
    #[arg(long = "mcp-config", env = "CATALOG_MCP_CONFIG", value_delimiter = ',')]
    pub mcp_config: Vec<PathBuf>,
}

/// Arguments of `run`.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the SQLite catalog database
    #[arg(long, env = "CATALOG_DB")]
    pub db: PathBuf,

    #[command(flatten)]
    pub configs: ConfigArgs,

    /// Start without leadership: parse and watch configs but never write
    #[arg(long)]
    pub standby: bool,

    /// Reload sources when a config file changes
    #[arg(long)]
    pub watch: bool,

    /// Seconds shutdown waits for in-flight writes and running passes
    #[arg(long = "drain-timeout-secs", default_value_t = 10)]
    pub drain_timeout_secs: u64,
}

impl RunArgs {
    pub const fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the sync engine until interrupted
    Run(RunArgs),

    /// Parse and merge sources configs, then print the result
    Validate(ConfigArgs),

    /// Print the persisted status of every source
    Status {
        /// Path to the SQLite catalog database
        #[arg(long, env = "CATALOG_DB")]
        db: PathBuf,
    },
}
