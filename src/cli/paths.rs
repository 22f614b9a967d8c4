//! CLI subcommand: `tradegate paths`
//!
//! Prints all resolved XDG-compliant paths for debugging and scripting.

use anyhow::Result;

use crate::paths::Paths;

pub fn run() -> Result<()> {
    let paths = Paths::resolve()?;

    println!("tradegate paths (XDG Base Directory)");
    println!("====================================");
    println!();
    println!("Config:     {}", paths.config_dir.display());
    println!("  config.toml:    {}", paths.config_file().display());
    println!();
    println!("Data:       {}", paths.data_dir.display());
    println!("  identity:       {}", paths.identity_file().display());
    println!();
    println!("State:      {}", paths.state_dir.display());
    println!("  security log:   {}", paths.security_log().display());

    Ok(())
}
