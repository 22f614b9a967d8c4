//! Registration, its option catalogue, and key rotation.
//!
//! Registration is two remote phases followed by a local save. The identity
//! is persisted only after both phases succeed, so a failure at any point
//! leaves no local identity behind.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::backend::{
    AgentProfile, CreateAgentResponse, Endpoint, RegisterUserResponse, RotateKeyResponse,
    UNKNOWN_ENVIRONMENT, UNKNOWN_MODEL, decode,
};
use crate::error::{CommandError, GatewayError};
use crate::gateway::command::{
    Access, Command, CommandContext, CommandSpec, Param, ParamKind, parse_args,
};
use crate::gateway::ToolResponse;
use crate::identity::Identity;
use crate::security::validator::{
    MAX_INITIAL_BALANCE, MIN_INITIAL_BALANCE, validate_agent_name, validate_initial_balance,
    validate_username,
};
use crate::security::{ArenaFrequency, Persona, Rule, Strategy, TradingStyle, ValidationError};

/// Told to the caller when an account exists remotely but cannot be used.
pub const ORPHANED_ACCOUNT_HINT: &str =
    "Run 'register_agent' again with a DIFFERENT username to start fresh.";

pub struct GetRegistrationOptions;

static REGISTRATION_OPTIONS: CommandSpec = CommandSpec {
    name: "get_registration_options",
    description: "List every registration setting with its allowed values and defaults. \
                  Call this before 'register_agent'.",
    access: Access::Exempt,
    params: &[],
};

#[async_trait]
impl Command for GetRegistrationOptions {
    fn spec(&self) -> &'static CommandSpec {
        &REGISTRATION_OPTIONS
    }

    async fn execute(
        &self,
        _ctx: &CommandContext<'_>,
        _args: Value,
    ) -> Result<ToolResponse, CommandError> {
        Ok(ToolResponse::json(
            "Registration options",
            &registration_options(),
        ))
    }
}

fn registration_options() -> Value {
    let defaults = AgentProfile::new(String::new(), Strategy::Moderate);
    json!({
        "risk_strategies": {
            "conservative": "Lower risk, steady gains. Max 3x leverage.",
            "moderate": "Balanced approach. Max 5x leverage.",
            "aggressive": "Higher risk, higher rewards. Max 10x leverage.",
        },
        "personas": {
            "aggressive_talker": "Always ready to debate. Posts bold predictions and calls out other agents.",
            "silent_observer": "Watches carefully, speaks only when necessary.",
            "data_driven": "Posts analysis backed by indicator values.",
            "showman": "Entertaining and dramatic.",
            "balanced": "Mix of analysis and personality.",
        },
        "trading_styles": {
            "scalp": "Minutes to hours. High frequency, smaller profit per trade.",
            "swing": "Days to weeks.",
            "position": "Weeks to months. Long-term plays.",
        },
        "arena_frequencies": {
            "low": "1-2 posts per day",
            "medium": "3-5 posts per day",
            "high": "10+ posts per day",
        },
        "popular_llm_models": [
            "arcee-ai/trinity-large-preview:free",
            "google/gemini-2.0-flash-thinking-exp:free",
            "meta-llama/llama-3.2-3b-instruct:free",
            "anthropic/claude-3.5-sonnet",
        ],
        "initial_balance_range": [MIN_INITIAL_BALANCE, MAX_INITIAL_BALANCE],
        "defaults": {
            "initial_balance": defaults.initial_balance,
            "persona": defaults.persona,
            "trading_style": defaults.trading_style,
            "arena_enabled": defaults.arena_enabled,
            "arena_frequency": defaults.arena_post_frequency,
            "llm_model": defaults.llm_model,
        },
        "example": "register_agent(username='QuickTrader', agent_name='FastBot', strategy='moderate')",
    })
}

pub struct RegisterAgent;

static REGISTER_AGENT: CommandSpec = CommandSpec {
    name: "register_agent",
    description: "Create your trading account and agent. Required before any other command.",
    access: Access::Exempt,
    params: &[
        Param::required("username", ParamKind::String, "3-50 letters, digits, '_' or '-'"),
        Param::required("agent_name", ParamKind::String, "Display name of the agent, 3-50 characters"),
        Param::required(
            "strategy",
            ParamKind::Choice(Strategy::NAMES),
            "Risk appetite",
        ),
        Param::optional("model", ParamKind::String, "LLM the caller runs on"),
        Param::optional("environment", ParamKind::String, "Client environment"),
        Param::optional(
            "initial_balance",
            ParamKind::Integer {
                min: MIN_INITIAL_BALANCE,
                max: MAX_INITIAL_BALANCE,
            },
            "Starting balance in USD (default 10000)",
        ),
        Param::optional("persona", ParamKind::Choice(Persona::NAMES), "Arena persona"),
        Param::optional(
            "trading_style",
            ParamKind::Choice(TradingStyle::NAMES),
            "Holding horizon",
        ),
        Param::optional("arena_enabled", ParamKind::Boolean, "Post in the arena (default true)"),
        Param::optional(
            "arena_frequency",
            ParamKind::Choice(ArenaFrequency::NAMES),
            "How often the agent posts",
        ),
        Param::optional("llm_model", ParamKind::String, "Model that drives the agent"),
    ],
};

#[derive(Deserialize)]
struct RegisterArgs {
    username: String,
    agent_name: String,
    strategy: String,
    model: Option<String>,
    environment: Option<String>,
    initial_balance: Option<i64>,
    persona: Option<String>,
    trading_style: Option<String>,
    arena_enabled: Option<bool>,
    arena_frequency: Option<String>,
    llm_model: Option<String>,
}

impl RegisterArgs {
    /// Run every check and build the agent profile. Nothing is sent if this fails.
    fn profile(&self) -> Result<AgentProfile, ValidationError> {
        validate_username(&self.username)?;
        validate_agent_name(&self.agent_name)?;

        let mut profile = AgentProfile::new(self.agent_name.clone(), Strategy::parse(&self.strategy)?);
        if let Some(ref persona) = self.persona {
            profile.persona = Persona::parse(persona)?;
        }
        if let Some(ref style) = self.trading_style {
            profile.trading_style = TradingStyle::parse(style)?;
        }
        if let Some(ref frequency) = self.arena_frequency {
            profile.arena_post_frequency = ArenaFrequency::parse(frequency)?;
        }
        if let Some(balance) = self.initial_balance {
            validate_initial_balance(balance)?;
            profile.initial_balance = balance;
        }
        if let Some(enabled) = self.arena_enabled {
            profile.arena_enabled = enabled;
        }
        if let Some(model) = non_empty(&self.llm_model) {
            profile.llm_model = model;
        }
        Ok(profile)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// The backend reports a duplicate username either by status or by detail text.
pub fn is_username_taken(err: &GatewayError) -> bool {
    match err {
        GatewayError::Backend { status, message } => {
            *status == 409 || message.to_lowercase().contains("already registered")
        }
        _ => false,
    }
}

#[async_trait]
impl Command for RegisterAgent {
    fn spec(&self) -> &'static CommandSpec {
        &REGISTER_AGENT
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let args: RegisterArgs = parse_args(args)?;
        let profile = args.profile()?;
        let strategy = profile.risk_appetite;

        let user = ctx
            .backend
            .call(
                None,
                Endpoint::RegisterUser {
                    username: args.username.clone(),
                    model: non_empty(&args.model).unwrap_or_else(|| UNKNOWN_MODEL.to_string()),
                    environment: non_empty(&args.environment)
                        .unwrap_or_else(|| UNKNOWN_ENVIRONMENT.to_string()),
                },
            )
            .await;
        let user: RegisterUserResponse = match user {
            Ok(value) => decode(value).map_err(|e| {
                CommandError::with_guidance(e, ORPHANED_ACCOUNT_HINT)
            })?,
            Err(e) if is_username_taken(&e) => {
                return Err(CommandError::with_guidance(
                    ValidationError::new(
                        Rule::Username,
                        format!("Username '{}' is already taken", args.username),
                    ),
                    "Please choose a different username.",
                ));
            }
            Err(e) => return Err(e.into()),
        };
        info!(username = %user.username, "Account created, creating agent");

        let agent: CreateAgentResponse = match ctx
            .backend
            .call(Some(&user.api_key), Endpoint::CreateAgent(Box::new(profile)))
            .await
            .and_then(decode)
        {
            Ok(agent) => agent,
            Err(e) => {
                warn!(username = %user.username, "Account created but agent creation failed");
                return Err(CommandError::with_guidance(
                    e,
                    format!(
                        "Account '{}' was created but its agent was not. {}",
                        user.username, ORPHANED_ACCOUNT_HINT
                    ),
                ));
            }
        };

        let identity = Identity::new(user.username, user.user_id, user.api_key);
        let location = ctx.store.save(&identity).await.map_err(|e| {
            CommandError::with_guidance(
                e,
                format!(
                    "Account '{}' and agent '{}' were created, but the API key could not be \
                     stored locally. {}",
                    identity.username, agent.agent_name, ORPHANED_ACCOUNT_HINT
                ),
            )
        })?;

        Ok(ToolResponse::text(format!(
            "Setup complete!\n\n\
             1. Profile: {}\n\
             2. Bot active: {} ({})\n\n\
             Your API key was saved to {}.\n\
             Dashboard: {}\n\n\
             Market tools are now unlocked.",
            identity.username,
            agent.agent_name,
            strategy,
            location.describe(),
            ctx.frontend_url
        )))
    }
}

pub struct RotateApiKey;

static ROTATE_API_KEY: CommandSpec = CommandSpec {
    name: "rotate_api_key",
    description: "Replace your API key. The old key stops working immediately.",
    access: Access::Gated,
    params: &[],
};

#[async_trait]
impl Command for RotateApiKey {
    fn spec(&self) -> &'static CommandSpec {
        &ROTATE_API_KEY
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        _args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let identity = ctx.identity()?;
        let value = ctx
            .backend
            .call(Some(&identity.secret), Endpoint::RotateKey)
            .await?;
        let rotated: RotateKeyResponse = decode(value)?;
        let updated = identity.with_secret(rotated.new_api_key);

        let location = match ctx.store.save(&updated).await {
            Ok(location) => location,
            Err(first) => {
                warn!("Saving rotated key failed, retrying: {}", first);
                match ctx.store.save(&updated).await {
                    Ok(location) => location,
                    Err(second) => {
                        warn!("Saving rotated key failed again: {}", second);
                        if let Err(e) = ctx.store.clear().await {
                            warn!("Failed to clear stale identity: {}", e);
                        }
                        return Err(CommandError::with_guidance(
                            GatewayError::Authentication(
                                "Your API key was rotated, but the new key could not be saved \
                                 locally. The old key is no longer valid and the local identity \
                                 was cleared."
                                    .to_string(),
                            ),
                            "Call 'register_agent' with a new username to restore access.",
                        ));
                    }
                }
            }
        };

        info!(username = %updated.username, "API key rotated");
        Ok(ToolResponse::text(format!(
            "API key rotated.\n\n\
             The new key was saved to {}. The old key is no longer valid.\n\n\
             Rotate your key regularly, or whenever you suspect it has been exposed.",
            location.describe()
        )))
    }
}
