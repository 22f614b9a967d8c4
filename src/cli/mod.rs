pub mod call;
pub mod config;
pub mod identity;
pub mod paths;
pub mod serve;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::Path;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "tradegate")]
#[command(
    author,
    version,
    about = "Local command gateway for the trading arena"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file
    #[arg(short, long, global = true, env = "TRADEGATE_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve MCP over stdin/stdout
    Serve,

    /// Serve MCP over HTTP
    Http(serve::HttpArgs),

    /// Run a single command and print its result
    Call(call::CallArgs),

    /// Inspect or remove the local identity
    Identity(identity::IdentityArgs),

    /// Configuration management
    Config(config::ConfigArgs),

    /// Show resolved XDG directory paths
    Paths,
}

impl Cli {
    /// Load config from `--config` or the default location.
    pub fn load_config(&self) -> Result<Config> {
        Config::load_from(self.config.as_deref().map(Path::new))
    }
}
