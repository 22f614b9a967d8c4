use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use crate::config::Config;
use crate::gateway::Dispatcher;

#[derive(Args)]
pub struct CallArgs {
    /// Command name, e.g. get_leaderboard
    pub name: String,

    /// Arguments as a JSON object
    #[arg(short, long)]
    pub args: Option<String>,

    /// Print the raw result as JSON instead of its text
    #[arg(long)]
    pub json: bool,
}

pub async fn run(args: CallArgs, config: Config) -> Result<()> {
    let arguments = parse_arguments(args.args.as_deref())?;
    let dispatcher = Dispatcher::from_config(&config)?;
    let response = dispatcher.dispatch(&args.name, arguments).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("{}", response.text_content());
    }

    if response.is_error {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_arguments(raw: Option<&str>) -> Result<Value> {
    match raw {
        None => Ok(Value::Null),
        Some(raw) => serde_json::from_str(raw).context("--args must be a JSON object"),
    }
}
