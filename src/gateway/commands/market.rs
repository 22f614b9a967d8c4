use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::section;
use crate::backend::Endpoint;
use crate::error::CommandError;
use crate::gateway::command::{
    Access, Command, CommandContext, CommandSpec, Param, ParamKind, parse_args,
};
use crate::gateway::ToolResponse;
use crate::security::validator::{MAX_LIMIT, MIN_LIMIT, validate_limit, validate_symbol};

pub const DEFAULT_LEADERBOARD_LIMIT: i64 = 5;
pub const DEFAULT_SYMBOL: &str = "BTC/USDT";

pub struct GetLeaderboard;

static LEADERBOARD: CommandSpec = CommandSpec {
    name: "get_leaderboard",
    description: "Top trading agents ranked by performance.",
    access: Access::Gated,
    params: &[Param::optional(
        "limit",
        ParamKind::Integer {
            min: MIN_LIMIT,
            max: MAX_LIMIT,
        },
        "Number of agents to return (default 5)",
    )],
};

#[derive(Deserialize)]
struct LimitArgs {
    limit: Option<i64>,
}

#[async_trait]
impl Command for GetLeaderboard {
    fn spec(&self) -> &'static CommandSpec {
        &LEADERBOARD
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let args: LimitArgs = parse_args(args)?;
        let limit = args.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT);
        validate_limit(limit)?;

        let data = ctx
            .backend
            .call(Some(ctx.credential()?), Endpoint::Leaderboard { limit })
            .await?;
        Ok(ToolResponse::json("Leaderboard", section(&data, "top_agents")))
    }
}

pub struct GetAgentStats;

static AGENT_STATS: CommandSpec = CommandSpec {
    name: "get_agent_stats",
    description: "Arena-wide statistics across all agents.",
    access: Access::Gated,
    params: &[],
};

#[async_trait]
impl Command for GetAgentStats {
    fn spec(&self) -> &'static CommandSpec {
        &AGENT_STATS
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        _args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let data = ctx
            .backend
            .call(Some(ctx.credential()?), Endpoint::AgentStats)
            .await?;
        Ok(ToolResponse::json("Agent statistics", &data))
    }
}

pub struct GetMarketData;

static MARKET_DATA: CommandSpec = CommandSpec {
    name: "get_market_data",
    description: "Current price and market status for a trading pair.",
    access: Access::Gated,
    params: &[Param::optional(
        "symbol",
        ParamKind::String,
        "Trading pair such as BTC/USDT (default BTC/USDT)",
    )],
};

#[derive(Deserialize)]
struct SymbolArgs {
    symbol: Option<String>,
}

#[async_trait]
impl Command for GetMarketData {
    fn spec(&self) -> &'static CommandSpec {
        &MARKET_DATA
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let args: SymbolArgs = parse_args(args)?;
        let symbol = args.symbol.unwrap_or_else(|| DEFAULT_SYMBOL.to_string());
        validate_symbol(&symbol)?;

        let heading = format!("Market data for {}", symbol);
        let data = ctx
            .backend
            .call(Some(ctx.credential()?), Endpoint::MarketStatus { symbol })
            .await?;
        Ok(ToolResponse::json(&heading, &data))
    }
}

pub struct GetCryptoNews;

static CRYPTO_NEWS: CommandSpec = CommandSpec {
    name: "get_crypto_news",
    description: "Latest crypto news, optionally filtered by trading pair.",
    access: Access::Gated,
    params: &[Param::optional(
        "symbol",
        ParamKind::String,
        "Trading pair such as ETH/USDT",
    )],
};

#[async_trait]
impl Command for GetCryptoNews {
    fn spec(&self) -> &'static CommandSpec {
        &CRYPTO_NEWS
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let args: SymbolArgs = parse_args(args)?;
        if let Some(ref symbol) = args.symbol {
            validate_symbol(symbol)?;
        }

        let data = ctx
            .backend
            .call(
                Some(ctx.credential()?),
                Endpoint::News {
                    symbol: args.symbol,
                },
            )
            .await?;
        Ok(ToolResponse::json("Crypto news", &data))
    }
}
