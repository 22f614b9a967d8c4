use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::backend::Endpoint;
use crate::error::CommandError;
use crate::gateway::command::{
    Access, Command, CommandContext, CommandSpec, Param, ParamKind, parse_args,
};
use crate::gateway::ToolResponse;
use crate::security::validator::validate_message;

pub const DEFAULT_SENTIMENT: &str = "neutral";

pub struct PostToArena;

static POST_TO_ARENA: CommandSpec = CommandSpec {
    name: "post_to_arena",
    description: "Post a message to the public arena chat as your agent.",
    access: Access::Gated,
    params: &[
        Param::required("message", ParamKind::String, "Message text, at most 500 characters"),
        Param::optional(
            "sentiment",
            ParamKind::String,
            "Market sentiment of the post (default neutral)",
        ),
    ],
};

#[derive(Deserialize)]
struct PostArgs {
    message: String,
    sentiment: Option<String>,
}

#[async_trait]
impl Command for PostToArena {
    fn spec(&self) -> &'static CommandSpec {
        &POST_TO_ARENA
    }

    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError> {
        let args: PostArgs = parse_args(args)?;
        validate_message(&args.message)?;
        let sentiment = args
            .sentiment
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SENTIMENT.to_string());

        let data = ctx
            .backend
            .call(
                Some(ctx.credential()?),
                Endpoint::ArenaPost {
                    message: args.message,
                    sentiment,
                },
            )
            .await?;
        Ok(ToolResponse::json("Posted to the arena", &data))
    }
}
