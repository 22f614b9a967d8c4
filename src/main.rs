use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing_subscriber::EnvFilter;

use tradegate::cli::{self, Cli, Commands};
use tradegate::config::LoggingConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    // Commands that must work before a valid config exists.
    match cli.command {
        Commands::Config(args) => {
            init_logging(cli.verbose, None);
            return cli::config::run(args, cli.config.as_deref().map(Path::new));
        }
        Commands::Paths => {
            init_logging(cli.verbose, None);
            return cli::paths::run();
        }
        _ => {}
    }

    let config = cli.load_config()?;
    init_logging(cli.verbose, Some(&config.logging));

    match cli.command {
        Commands::Serve => cli::serve::run_stdio(config).await,
        Commands::Http(args) => cli::serve::run_http(args, config).await,
        Commands::Call(args) => cli::call::run(args, config).await,
        Commands::Identity(args) => cli::identity::run(args, config).await,
        Commands::Config(_) | Commands::Paths => unreachable!("handled above"),
    }
}

/// Logs always go to stderr; stdout belongs to the stdio transport.
fn init_logging(verbose: bool, logging: Option<&LoggingConfig>) {
    let level = if verbose {
        "debug"
    } else {
        logging.map(|l| l.level.as_str()).unwrap_or("info")
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.is_some_and(|l| l.format == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}
