use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, write_template};

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show effective configuration (file plus environment overrides)
    Show {
        /// Output format: toml (default) or json
        #[arg(short, long, default_value = "toml")]
        format: String,
    },

    /// Get a configuration value
    Get {
        /// Config key (e.g., backend.url)
        key: String,
    },

    /// Show config file path
    Path,

    /// Initialize default config file
    Init {
        /// Overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub fn run(args: ConfigArgs, config_file: Option<&Path>) -> Result<()> {
    match args.command {
        ConfigCommands::Show { format } => show_config(config_file, &format),
        ConfigCommands::Get { key } => get_config(config_file, &key),
        ConfigCommands::Path => {
            println!("{}", resolve_path(config_file)?.display());
            Ok(())
        }
        ConfigCommands::Init { force } => init_config(&resolve_path(config_file)?, force),
    }
}

fn resolve_path(config_file: Option<&Path>) -> Result<PathBuf> {
    match config_file {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::config_path(),
    }
}

fn show_config(config_file: Option<&Path>, format: &str) -> Result<()> {
    let config = Config::load_from(config_file)?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        _ => println!("{}", toml::to_string_pretty(&config)?),
    }

    Ok(())
}

fn get_config(config_file: Option<&Path>, key: &str) -> Result<()> {
    let config = Config::load_from(config_file)?;
    println!("{}", config.get_value(key)?);
    Ok(())
}

fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    write_template(path)?;
    Ok(())
}
