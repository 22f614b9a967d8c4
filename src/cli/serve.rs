use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::config::Config;
use crate::gateway::Dispatcher;
use crate::server::{Server, serve_stdio};

#[derive(Args)]
pub struct HttpArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub async fn run_stdio(config: Config) -> Result<()> {
    let dispatcher = Arc::new(Dispatcher::from_config(&config)?);
    serve_stdio(dispatcher).await
}

pub async fn run_http(args: HttpArgs, mut config: Config) -> Result<()> {
    if let Some(port) = args.port {
        config.server.port = port;
        config.validate()?;
    }

    let dispatcher = Arc::new(Dispatcher::from_config(&config)?);
    Server::new(&config, dispatcher).run().await
}
