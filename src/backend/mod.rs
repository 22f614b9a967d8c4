//! Remote trading service.
//!
//! [`Endpoint`] is the closed catalogue of remote operations; [`Backend`]
//! is the seam the dispatcher calls through, implemented for real by
//! [`BackendClient`] and by hand-written doubles in tests.

mod client;
mod types;

pub use client::{BackendClient, USER_AGENT};
pub use types::{
    AgentProfile, CreateAgentResponse, RegisterUserResponse, RotateKeyResponse, decode,
};

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{Value, json};

use crate::error::GatewayError;
use crate::security::AlertStatus;

/// Placeholder sent when the caller does not say which model/environment it runs in.
pub const UNKNOWN_MODEL: &str = "unknown-llm";
pub const UNKNOWN_ENVIRONMENT: &str = "unknown-env";

#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    RegisterUser {
        username: String,
        model: String,
        environment: String,
    },
    CreateAgent(Box<AgentProfile>),
    RotateKey,
    Portfolio,
    OpenPositions,
    PositionHistory,
    TradeHistory { limit: i64, symbol: Option<String> },
    Alerts { status: AlertStatus },
    Leaderboard { limit: i64 },
    AgentStats,
    MarketStatus { symbol: String },
    News { symbol: Option<String> },
    Chat { message: String },
    ArenaPost { message: String, sentiment: String },
    Activity,
}

impl Endpoint {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::RegisterUser { .. } => "register_user",
            Endpoint::CreateAgent(_) => "create_agent",
            Endpoint::RotateKey => "rotate_key",
            Endpoint::Portfolio => "portfolio",
            Endpoint::OpenPositions => "open_positions",
            Endpoint::PositionHistory => "position_history",
            Endpoint::TradeHistory { .. } => "trade_history",
            Endpoint::Alerts { .. } => "alerts",
            Endpoint::Leaderboard { .. } => "leaderboard",
            Endpoint::AgentStats => "agent_stats",
            Endpoint::MarketStatus { .. } => "market_status",
            Endpoint::News { .. } => "news",
            Endpoint::Chat { .. } => "chat",
            Endpoint::ArenaPost { .. } => "arena_post",
            Endpoint::Activity => "activity",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Endpoint::RegisterUser { .. }
            | Endpoint::CreateAgent(_)
            | Endpoint::RotateKey
            | Endpoint::Chat { .. }
            | Endpoint::ArenaPost { .. } => Method::POST,
            _ => Method::GET,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::RegisterUser { .. } => "/api/auth/register",
            Endpoint::CreateAgent(_) => "/api/user/agent",
            Endpoint::RotateKey => "/api/auth/rotate-key",
            Endpoint::Portfolio => "/api/user/performance",
            Endpoint::OpenPositions => "/api/trading/positions/open",
            Endpoint::PositionHistory => "/api/trading/positions/history",
            Endpoint::TradeHistory { .. } => "/api/user/trades",
            Endpoint::Alerts { .. } => "/api/alerts/my-alerts",
            Endpoint::Leaderboard { .. } => "/api/leaderboard",
            Endpoint::AgentStats => "/api/leaderboard/stats",
            Endpoint::MarketStatus { .. } => "/api/market/status",
            Endpoint::News { .. } => "/api/market/news",
            Endpoint::Chat { .. } => "/api/user/chat",
            Endpoint::ArenaPost { .. } => "/api/arena/post",
            Endpoint::Activity => "/api/user/activity",
        }
    }

    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Endpoint::TradeHistory { limit, symbol } => {
                let mut query = vec![("limit", limit.to_string())];
                if let Some(symbol) = symbol {
                    query.push(("symbol", symbol.clone()));
                }
                query
            }
            Endpoint::Alerts { status } => vec![("status", status.as_str().to_string())],
            Endpoint::Leaderboard { limit } => vec![("limit", limit.to_string())],
            Endpoint::MarketStatus { symbol } => vec![("symbol", symbol.clone())],
            Endpoint::News {
                symbol: Some(symbol),
            } => vec![("symbol", symbol.clone())],
            _ => Vec::new(),
        }
    }

    pub fn body(&self) -> Option<Value> {
        match self {
            Endpoint::RegisterUser {
                username,
                model,
                environment,
            } => Some(json!({
                "username": username,
                "model": model,
                "environment": environment,
            })),
            Endpoint::CreateAgent(profile) => serde_json::to_value(profile).ok(),
            Endpoint::Chat { message } => Some(json!({ "message": message })),
            Endpoint::ArenaPost { message, sentiment } => Some(json!({
                "message": message,
                "sentiment": sentiment,
            })),
            _ => None,
        }
    }
}

/// The remote trading service as seen by command handlers.
///
/// `credential` is attached as a bearer token when present. A successful
/// call yields the decoded JSON body.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn call(&self, credential: Option<&str>, endpoint: Endpoint)
    -> Result<Value, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_and_paths() {
        assert_eq!(Endpoint::RotateKey.method(), Method::POST);
        assert_eq!(Endpoint::Portfolio.method(), Method::GET);
        assert_eq!(Endpoint::Portfolio.path(), "/api/user/performance");
        assert_eq!(
            Endpoint::Chat {
                message: "hi".into()
            }
            .method(),
            Method::POST
        );
    }

    #[test]
    fn trade_history_query_omits_missing_symbol() {
        let endpoint = Endpoint::TradeHistory {
            limit: 10,
            symbol: None,
        };
        assert_eq!(endpoint.query(), vec![("limit", "10".to_string())]);

        let endpoint = Endpoint::TradeHistory {
            limit: 5,
            symbol: Some("ETH/USDT".into()),
        };
        assert_eq!(endpoint.query().len(), 2);
    }

    #[test]
    fn registration_body_carries_placeholders() {
        let endpoint = Endpoint::RegisterUser {
            username: "alice".into(),
            model: UNKNOWN_MODEL.into(),
            environment: UNKNOWN_ENVIRONMENT.into(),
        };
        let body = endpoint.body().unwrap();
        assert_eq!(body["username"], "alice");
        assert_eq!(body["model"], "unknown-llm");
        assert_eq!(body["environment"], "unknown-env");
    }

    #[test]
    fn get_endpoints_have_no_body() {
        assert!(Endpoint::Activity.body().is_none());
        assert!(
            Endpoint::News { symbol: None }.query().is_empty(),
            "news without symbol sends no query"
        );
    }
}
