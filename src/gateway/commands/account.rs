use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::section;
use crate::backend::Endpoint;
use crate::error::{CommandError, GatewayError};
use crate::gateway::command::{
    Access, Command, CommandContext, CommandSpec, Param, ParamKind, parse_args,
};
use crate::gateway::ToolResponse;
use crate::security::validator::{
    MAX_LIMIT, MIN_LIMIT, validate_limit, validate_message, validate_symbol,
};
use crate::security::{AlertStatus, PositionStatus};

pub const DEFAULT_TRADE_LIMIT: i64 = 10;

pub struct GetMyPortfolio;

static PORTFOLIO: CommandSpec = CommandSpec {
    name: "get_my_portfolio",
    description: "Balance, equity and performance of your agent.",
    access: Access::Gated,
    params: &[],
};

#[async_trait]
impl Command for GetMyPortfolio {
    fn spec(&self) -> &'static CommandSpec {
        &PORTFOLIO
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        _args: Value,
    ) -> Result<ToolResponse, CommandError> {
        match ctx
            .backend
            .call(Some(ctx.credential()?), Endpoint::Portfolio)
            .await
        {
            Ok(data) => Ok(ToolResponse::json("Portfolio", &data)),
            Err(GatewayError::NotFound(_)) => Ok(ToolResponse::text(
                "No portfolio data found. Create an agent first.",
            )),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct GetMyPositions;

static POSITIONS: CommandSpec = CommandSpec {
    name: "get_my_positions",
    description: "Your agent's positions.",
    access: Access::Gated,
    params: &[Param::optional(
        "status",
        ParamKind::Choice(PositionStatus::NAMES),
        "open (default), closed or all",
    )],
};

#[derive(Deserialize)]
struct StatusArgs {
    status: Option<String>,
}

#[async_trait]
impl Command for GetMyPositions {
    fn spec(&self) -> &'static CommandSpec {
        &POSITIONS
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let args: StatusArgs = parse_args(args)?;
        let status = match args.status {
            Some(ref s) => PositionStatus::parse(s)?,
            None => PositionStatus::Open,
        };

        let endpoint = match status {
            PositionStatus::Open => Endpoint::OpenPositions,
            PositionStatus::Closed | PositionStatus::All => Endpoint::PositionHistory,
        };

        match ctx.backend.call(Some(ctx.credential()?), endpoint).await {
            Ok(data) => Ok(ToolResponse::json(
                &format!("Positions ({})", status),
                section(&data, "positions"),
            )),
            Err(GatewayError::NotFound(_)) => {
                Ok(ToolResponse::text(format!("No {} positions found.", status)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub struct GetMyTradeHistory;

static TRADE_HISTORY: CommandSpec = CommandSpec {
    name: "get_my_trade_history",
    description: "Your agent's executed trades, newest first.",
    access: Access::Gated,
    params: &[
        Param::optional(
            "limit",
            ParamKind::Integer {
                min: MIN_LIMIT,
                max: MAX_LIMIT,
            },
            "Number of trades (default 10)",
        ),
        Param::optional("symbol", ParamKind::String, "Only trades for this pair"),
    ],
};

#[derive(Deserialize)]
struct TradeHistoryArgs {
    limit: Option<i64>,
    symbol: Option<String>,
}

#[async_trait]
impl Command for GetMyTradeHistory {
    fn spec(&self) -> &'static CommandSpec {
        &TRADE_HISTORY
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let args: TradeHistoryArgs = parse_args(args)?;
        let limit = args.limit.unwrap_or(DEFAULT_TRADE_LIMIT);
        validate_limit(limit)?;
        if let Some(ref symbol) = args.symbol {
            validate_symbol(symbol)?;
        }

        let data = ctx
            .backend
            .call(
                Some(ctx.credential()?),
                Endpoint::TradeHistory {
                    limit,
                    symbol: args.symbol,
                },
            )
            .await?;
        Ok(ToolResponse::json("Trade history", section(&data, "trades")))
    }
}

pub struct GetMyAlerts;

static ALERTS: CommandSpec = CommandSpec {
    name: "get_my_alerts",
    description: "Price and risk alerts for your agent.",
    access: Access::Gated,
    params: &[Param::optional(
        "status",
        ParamKind::Choice(AlertStatus::NAMES),
        "active (default), triggered or all",
    )],
};

#[async_trait]
impl Command for GetMyAlerts {
    fn spec(&self) -> &'static CommandSpec {
        &ALERTS
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let args: StatusArgs = parse_args(args)?;
        let status = match args.status {
            Some(ref s) => AlertStatus::parse(s)?,
            None => AlertStatus::Active,
        };

        match ctx
            .backend
            .call(Some(ctx.credential()?), Endpoint::Alerts { status })
            .await
        {
            Ok(data) => Ok(ToolResponse::json(
                &format!("Alerts ({})", status),
                section(&data, "alerts"),
            )),
            Err(GatewayError::NotFound(_)) => {
                Ok(ToolResponse::text(format!("No {} alerts found.", status)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub struct ChatWithMyBot;

static CHAT: CommandSpec = CommandSpec {
    name: "chat_with_my_bot",
    description: "Ask your trading agent a question.",
    access: Access::Gated,
    params: &[Param::required(
        "message",
        ParamKind::String,
        "Message text, at most 500 characters",
    )],
};

#[derive(Deserialize)]
struct ChatArgs {
    message: String,
}

#[async_trait]
impl Command for ChatWithMyBot {
    fn spec(&self) -> &'static CommandSpec {
        &CHAT
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let args: ChatArgs = parse_args(args)?;
        validate_message(&args.message)?;

        let data = ctx
            .backend
            .call(
                Some(ctx.credential()?),
                Endpoint::Chat {
                    message: args.message,
                },
            )
            .await?;

        let Some(reply) = data.get("response").and_then(Value::as_str) else {
            return Ok(ToolResponse::json("Agent reply", &data));
        };
        let mut text = reply.to_string();
        if let Some(context) = data.get("context").filter(|c| !c.is_null()) {
            let context = serde_json::to_string_pretty(context).unwrap_or_default();
            text.push_str("\n\nContext:\n");
            text.push_str(&context);
        }
        Ok(ToolResponse::text(text))
    }
}

pub struct GetAgentActivity;

static ACTIVITY: CommandSpec = CommandSpec {
    name: "get_agent_activity",
    description: "What your agent did in the last 24 hours.",
    access: Access::Gated,
    params: &[],
};

#[async_trait]
impl Command for GetAgentActivity {
    fn spec(&self) -> &'static CommandSpec {
        &ACTIVITY
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        _args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let data = ctx
            .backend
            .call(Some(ctx.credential()?), Endpoint::Activity)
            .await?;

        if data.get("total").and_then(Value::as_i64) == Some(0) {
            let agent = data
                .get("agent_name")
                .and_then(Value::as_str)
                .unwrap_or("Your agent");
            return Ok(ToolResponse::text(format!(
                "{} has no activity in the last 24 hours.",
                agent
            )));
        }
        Ok(ToolResponse::json("Agent activity", &data))
    }
}
