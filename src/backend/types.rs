use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GatewayError;
use crate::security::{ArenaFrequency, Persona, Strategy, TradingStyle};

pub const DEFAULT_INITIAL_BALANCE: i64 = 10_000;
pub const DEFAULT_LLM_MODEL: &str = "arcee-ai/trinity-large-preview:free";

/// Agent configuration sent in the second registration phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentProfile {
    pub agent_name: String,
    pub risk_appetite: Strategy,
    pub initial_balance: i64,
    pub persona: Persona,
    pub trading_style: TradingStyle,
    pub arena_enabled: bool,
    pub arena_post_frequency: ArenaFrequency,
    pub arena_respond_to_mentions: bool,
    pub arena_respond_to_all: bool,
    pub llm_model: String,
    pub rsi_enabled: bool,
    pub rsi_period: u32,
    pub rsi_oversold: u32,
    pub rsi_overbought: u32,
    pub macd_enabled: bool,
    pub macd_fast: u32,
    pub macd_slow: u32,
    pub macd_signal: u32,
}

impl AgentProfile {
    /// Profile with the standard indicator settings.
    pub fn new(agent_name: String, risk_appetite: Strategy) -> Self {
        Self {
            agent_name,
            risk_appetite,
            initial_balance: DEFAULT_INITIAL_BALANCE,
            persona: Persona::Balanced,
            trading_style: TradingStyle::Swing,
            arena_enabled: true,
            arena_post_frequency: ArenaFrequency::Medium,
            arena_respond_to_mentions: true,
            arena_respond_to_all: false,
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            rsi_enabled: true,
            rsi_period: 14,
            rsi_oversold: 30,
            rsi_overbought: 70,
            macd_enabled: true,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterUserResponse {
    pub username: String,
    pub user_id: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAgentResponse {
    pub agent_name: String,
    #[serde(default)]
    pub agent_id: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RotateKeyResponse {
    pub new_api_key: String,
}

/// Decode a success body into a typed response.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(|e| {
        GatewayError::backend(502, format!("Backend returned an unexpected response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_defaults_serialize_as_wire_names() {
        let profile = AgentProfile::new("Bot".into(), Strategy::Moderate);
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["risk_appetite"], "moderate");
        assert_eq!(value["persona"], "balanced");
        assert_eq!(value["trading_style"], "swing");
        assert_eq!(value["arena_post_frequency"], "medium");
        assert_eq!(value["initial_balance"], 10_000);
        assert_eq!(value["rsi_period"], 14);
        assert_eq!(value["macd_slow"], 26);
    }

    #[test]
    fn decode_reports_shape_mismatch_as_backend_failure() {
        let err = decode::<RotateKeyResponse>(json!({ "unexpected": true })).unwrap_err();
        assert_eq!(err.status_code(), Some(502));

        let ok: RegisterUserResponse =
            decode(json!({ "username": "a", "user_id": "1", "api_key": "k" })).unwrap();
        assert_eq!(ok.user_id, "1");
    }
}
