pub mod check;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tm_domain::config::{load_env_file, LayeredEnv, TableauConfig};
use tm_domain::error::ConfigError;

/// Env file read when `--env-file` is not given.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// tableau-mcp — Tableau Server tools for MCP clients.
#[derive(Debug, Parser)]
#[command(name = "tableau-mcp", version, about)]
pub struct Cli {
    /// Env file with TABLEAU_* settings. Exported variables take precedence.
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_ENV_FILE)]
    pub env_file: PathBuf,

    /// Read configuration from exported variables only.
    #[arg(long, global = true, conflicts_with = "env_file")]
    pub no_env_file: bool,

    /// Log at debug level (overrides RUST_LOG).
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve MCP over stdin/stdout (default when no subcommand is given).
    Serve {
        /// Sign in once before serving and exit if that fails.
        #[arg(long)]
        verify: bool,
    },
    /// Sign in, list a few workbooks and sign out.
    Check,
    /// Print the tool catalog as JSON.
    Tools,
    /// Print version information.
    Version,
}

// ── Config loading helper ─────────────────────────────────────────────

impl Cli {
    /// The env file to read, `None` with `--no-env-file`.
    pub fn env_file(&self) -> Option<&Path> {
        (!self.no_env_file).then_some(self.env_file.as_path())
    }
}

/// Build the environment that configuration is resolved from.
///
/// A named env file must exist. With `None` only exported variables are
/// consulted.
pub fn load_env(env_file: Option<&Path>) -> Result<LayeredEnv, ConfigError> {
    let file = match env_file {
        Some(path) => load_env_file(path)?,
        None => Default::default(),
    };
    Ok(LayeredEnv::new(file))
}

/// Resolve the full configuration. Shared by `serve` and `check`.
pub fn load_config(env_file: Option<&Path>) -> Result<TableauConfig, ConfigError> {
    let env = load_env(env_file)?;
    tracing::debug!(file_values = env.file_len(), "environment loaded");
    TableauConfig::from_env(&env)
}
