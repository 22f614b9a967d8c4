//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Each request runs as its own task; replies funnel through a single
//! writer so lines never interleave. Logs go to stderr, never stdout.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};

use super::rpc;
use crate::gateway::Dispatcher;

pub async fn serve_stdio(dispatcher: Arc<Dispatcher>) -> Result<()> {
    info!("Serving MCP over stdio");
    serve_streams(dispatcher, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Serve until `input` reaches EOF and every in-flight request has replied.
pub async fn serve_streams<R, W>(dispatcher: Arc<Dispatcher>, input: R, output: W) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut output = output;
        while let Some(line) = rx.recv().await {
            output.write_all(line.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    let mut requests = JoinSet::new();
    let mut lines = BufReader::new(input).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        if line.trim().is_empty() {
            continue;
        }
        let dispatcher = Arc::clone(&dispatcher);
        let tx = tx.clone();
        requests.spawn(async move {
            if let Some(reply) = rpc::handle_line(&dispatcher, &line).await {
                let _ = tx.send(reply);
            }
        });
    }
    debug!("stdin closed, draining {} in-flight requests", requests.len());

    while requests.join_next().await.is_some() {}
    drop(tx);
    writer
        .await
        .context("Writer task panicked")?
        .context("Failed to write response")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, Endpoint};
    use crate::config::RuntimeMode;
    use crate::error::{ErrorReporter, GatewayError};
    use crate::identity::CredentialStore;
    use async_trait::async_trait;
    use serde_json::Value;
    use tokio::io::AsyncReadExt;

    struct NoBackend;

    #[async_trait]
    impl Backend for NoBackend {
        async fn call(&self, _: Option<&str>, _: Endpoint) -> Result<Value, GatewayError> {
            Ok(Value::Null)
        }
    }

    #[tokio::test]
    async fn replies_once_per_request() {
        let tmp = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(CredentialStore::file_only(tmp.path().join("id.json"))),
            Arc::new(NoBackend),
            ErrorReporter::new(RuntimeMode::Hardened, None),
            "http://localhost:5173",
        ));

        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
            "\n",
        );

        let (client, server) = tokio::io::duplex(64 * 1024);
        serve_streams(dispatcher, input.as_bytes(), server)
            .await
            .unwrap();

        let mut output = String::new();
        let mut client = client;
        client.read_to_string(&mut output).await.unwrap();

        let mut ids: Vec<i64> = output
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["id"].as_i64().unwrap())
            .collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
