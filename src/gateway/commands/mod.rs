//! The closed set of commands exposed by the gateway.

mod account;
mod arena;
mod market;
mod registration;

pub use registration::{ORPHANED_ACCOUNT_HINT, is_username_taken};

use serde_json::Value;

use super::command::Command;

/// Every command, in the order they are advertised.
pub fn default_commands() -> Vec<Box<dyn Command>> {
    vec![
        Box::new(registration::GetRegistrationOptions),
        Box::new(registration::RegisterAgent),
        Box::new(market::GetLeaderboard),
        Box::new(market::GetAgentStats),
        Box::new(market::GetMarketData),
        Box::new(market::GetCryptoNews),
        Box::new(account::ChatWithMyBot),
        Box::new(account::GetMyPortfolio),
        Box::new(account::GetMyPositions),
        Box::new(account::GetMyTradeHistory),
        Box::new(account::GetMyAlerts),
        Box::new(account::GetAgentActivity),
        Box::new(arena::PostToArena),
        Box::new(registration::RotateApiKey),
    ]
}

/// `value[key]` when the backend wraps its payload, otherwise the whole body.
fn section<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(value)
}
