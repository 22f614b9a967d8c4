use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Backend, Endpoint};
use crate::config::Config;
use crate::error::GatewayError;

pub const USER_AGENT: &str = concat!("tradegate/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the trading service.
///
/// Holds no credential; each call carries its own.
#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .map_err(|e| anyhow::anyhow!("Invalid backend URL '{}': {}", base_url, e))?;

        Ok(Self {
            client: Client::new(),
            base_url,
            timeout,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(&config.backend.url, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: &Endpoint) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, endpoint.path()))
            .map_err(|e| GatewayError::Unknown(format!("Invalid backend URL: {}", e)))?;

        let query = endpoint.query();
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl Backend for BackendClient {
    async fn call(
        &self,
        credential: Option<&str>,
        endpoint: Endpoint,
    ) -> Result<Value, GatewayError> {
        let url = self.url_for(&endpoint)?;
        debug!(endpoint = endpoint.name(), method = %endpoint.method(), "Calling backend");

        let mut request = self
            .client
            .request(endpoint.method(), url)
            .header("Content-Type", "application/json")
            .header("User-Agent", USER_AGENT);
        if let Some(secret) = credential {
            request = request.header("Authorization", format!("Bearer {}", secret));
        }
        if let Some(body) = endpoint.body() {
            request = request.json(&body);
        }

        // The deadline covers the body read as well as the response head.
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body))
        };

        let (status, body) = match tokio::time::timeout(self.timeout, exchange).await {
            Err(_) => {
                warn!(endpoint = endpoint.name(), "Backend request timed out");
                return Err(GatewayError::backend(
                    504,
                    format!(
                        "Backend request timed out after {}ms",
                        self.timeout.as_millis()
                    ),
                ));
            }
            Ok(Err(e)) => {
                warn!(endpoint = endpoint.name(), "Backend unreachable: {}", e);
                return Err(GatewayError::backend(500, format!("Backend unreachable: {}", e)));
            }
            Ok(Ok(exchange)) => exchange,
        };

        debug!(endpoint = endpoint.name(), status = status.as_u16(), "Backend responded");
        interpret(status, &body)
    }
}

fn interpret(status: StatusCode, body: &[u8]) -> Result<Value, GatewayError> {
    if status.is_success() {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        return serde_json::from_slice(body)
            .map_err(|_| GatewayError::backend(502, "Backend returned an unreadable response"));
    }

    let detail = error_detail(body);
    if status == StatusCode::NOT_FOUND {
        return Err(GatewayError::NotFound(
            detail.unwrap_or_else(|| "Resource not found".to_string()),
        ));
    }

    Err(GatewayError::backend(
        status.as_u16(),
        detail.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Backend request failed")
                .to_string()
        }),
    ))
}

/// The `detail` field of an error body, when there is one.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    match value.get("detail")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::AgentProfile;
    use crate::security::{AlertStatus, Strategy};
    use mockito::Matcher;

    const KEY: &str = "ci_u12345678_abcdefABCDEF0123456789abcdefABCDEF01";

    fn client(server: &mockito::ServerGuard) -> BackendClient {
        BackendClient::new(&server.url(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sends_bearer_and_user_agent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/user/performance")
            .match_header("authorization", format!("Bearer {}", KEY).as_str())
            .match_header("user-agent", USER_AGENT)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"total_value": 10500.0}"#)
            .create_async()
            .await;

        let value = client(&server).call(Some(KEY), Endpoint::Portfolio).await.unwrap();
        assert_eq!(value["total_value"], 10500.0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn registration_sends_no_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/auth/register")
            .match_header("authorization", Matcher::Missing)
            .match_body(Matcher::PartialJson(serde_json::json!({
                "username": "alice",
                "model": "unknown-llm",
            })))
            .with_status(200)
            .with_body(r#"{"username":"alice","user_id":"u-1","api_key":"k"}"#)
            .create_async()
            .await;

        client(&server)
            .call(
                None,
                Endpoint::RegisterUser {
                    username: "alice".into(),
                    model: "unknown-llm".into(),
                    environment: "unknown-env".into(),
                },
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn query_parameters_are_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/user/trades")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("limit".into(), "10".into()),
                Matcher::UrlEncoded("symbol".into(), "ETH/USDT".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"trades": []}"#)
            .create_async()
            .await;

        client(&server)
            .call(
                Some(KEY),
                Endpoint::TradeHistory {
                    limit: 10,
                    symbol: Some("ETH/USDT".into()),
                },
            )
            .await
            .unwrap();
        mock.assert_async().await;

        let mock = server
            .mock("GET", "/api/alerts/my-alerts")
            .match_query(Matcher::UrlEncoded("status".into(), "triggered".into()))
            .with_status(200)
            .with_body(r#"{"alerts": []}"#)
            .create_async()
            .await;
        client(&server)
            .call(
                Some(KEY),
                Endpoint::Alerts {
                    status: AlertStatus::Triggered,
                },
            )
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn create_agent_posts_profile() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/user/agent")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "agent_name": "Bot",
                "risk_appetite": "aggressive",
                "rsi_period": 14,
            })))
            .with_status(201)
            .with_body(r#"{"agent_name":"Bot","agent_id":7}"#)
            .create_async()
            .await;

        let profile = AgentProfile::new("Bot".into(), Strategy::Aggressive);
        client(&server)
            .call(Some(KEY), Endpoint::CreateAgent(Box::new(profile)))
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn error_status_maps_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/auth/register")
            .with_status(400)
            .with_body(r#"{"detail": "Username already registered"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .call(
                None,
                Endpoint::RegisterUser {
                    username: "alice".into(),
                    model: "m".into(),
                    environment: "e".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GatewayError::backend(400, "Username already registered")
        );
    }

    #[tokio::test]
    async fn not_found_and_bodyless_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/trading/positions/open")
            .with_status(404)
            .with_body(r#"{"detail": "No positions"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/user/activity")
            .with_status(503)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let client = client(&server);
        let err = client.call(Some(KEY), Endpoint::OpenPositions).await.unwrap_err();
        assert_eq!(err, GatewayError::NotFound("No positions".into()));

        let err = client.call(Some(KEY), Endpoint::Activity).await.unwrap_err();
        assert_eq!(err, GatewayError::backend(503, "Service Unavailable"));
    }

    #[tokio::test]
    async fn unreadable_success_body_is_502() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/leaderboard/stats")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = client(&server).call(Some(KEY), Endpoint::AgentStats).await.unwrap_err();
        assert_eq!(err.status_code(), Some(502));
    }

    #[tokio::test]
    async fn unreachable_backend_is_500() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            BackendClient::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let err = client.call(Some(KEY), Endpoint::Portfolio).await.unwrap_err();
        assert_eq!(err.status_code(), Some(500));
        assert!(err.to_string().starts_with("Backend unreachable"));
    }

    #[tokio::test]
    async fn slow_backend_times_out_with_504() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer.
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            loop {
                if let Ok((socket, _)) = listener.accept().await {
                    held.push(socket);
                }
            }
        });

        let client =
            BackendClient::new(&format!("http://{}", addr), Duration::from_millis(200)).unwrap();
        let err = client.call(Some(KEY), Endpoint::Portfolio).await.unwrap_err();
        assert_eq!(err.status_code(), Some(504));
        server.abort();
    }

    #[test]
    fn base_url_path_prefix_is_kept() {
        let client =
            BackendClient::new("https://example.com/trading/", Duration::from_secs(1)).unwrap();
        let url = client.url_for(&Endpoint::Leaderboard { limit: 5 }).unwrap();
        assert_eq!(url.as_str(), "https://example.com/trading/api/leaderboard?limit=5");
    }
}
