//! HTTP transport.
//!
//! `POST /mcp` accepts the same JSON-RPC messages as stdio. `GET /tools`
//! lists command descriptors and `GET /health` answers liveness probes.

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::rpc::{self, RpcRequest};
use crate::config::Config;
use crate::gateway::Dispatcher;

/// Largest request body accepted on any route.
pub const MAX_BODY_BYTES: usize = 100 * 1024;

pub struct Server {
    config: Config,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    pub fn new(config: &Config, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            config: config.clone(),
            dispatcher,
        }
    }

    pub async fn run(&self) -> Result<()> {
        let app = router(Arc::clone(&self.dispatcher), &self.config.backend.frontend_url)?;

        let addr: SocketAddr = format!("{}:{}", self.config.server.bind, self.config.server.port)
            .parse()
            .context("Invalid server bind address")?;

        info!("Starting HTTP server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Build the router. CORS admits only the configured dashboard origin.
pub fn router(dispatcher: Arc<Dispatcher>, allowed_origin: &str) -> Result<Router> {
    let origin = HeaderValue::from_str(allowed_origin.trim_end_matches('/'))
        .with_context(|| format!("Invalid CORS origin: {}", allowed_origin))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/health", get(health_check))
        .route("/tools", get(list_tools))
        .route("/mcp", post(mcp))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_tools(State(dispatcher): State<Arc<Dispatcher>>) -> Json<Value> {
    Json(json!({ "tools": dispatcher.descriptors() }))
}

async fn mcp(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(request): Json<RpcRequest>,
) -> Response {
    match rpc::handle(&dispatcher, request).await {
        Some(response) => Json(response).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}
