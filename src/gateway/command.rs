use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::ToolResponse;
use crate::backend::Backend;
use crate::error::{CommandError, GatewayError};
use crate::identity::{CredentialStore, Identity};
use crate::security::{Rule, ValidationError};

/// Whether a command needs a registered identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Runs without an identity (registration and its catalogue).
    Exempt,
    Gated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer { min: i64, max: i64 },
    Boolean,
    /// One of a fixed set of strings.
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    pub description: &'static str,
}

impl Param {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Static description of a command: name, access rule and argument schema.
#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub access: Access,
    pub params: &'static [Param],
}

impl CommandSpec {
    /// JSON Schema for the arguments object.
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        for param in self.params {
            let mut schema = match param.kind {
                ParamKind::String => json!({ "type": "string" }),
                ParamKind::Integer { min, max } => {
                    json!({ "type": "integer", "minimum": min, "maximum": max })
                }
                ParamKind::Boolean => json!({ "type": "boolean" }),
                ParamKind::Choice(values) => json!({ "type": "string", "enum": values }),
            };
            schema["description"] = Value::String(param.description.to_string());
            properties.insert(param.name.to_string(), schema);
        }

        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Entry for capability advertisement.
    pub fn descriptor(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }

    /// Check shape, presence and JSON types. Ranges and choice membership are
    /// left to the domain validators so the caller gets their specific message.
    pub fn check_arguments(&self, args: &Value) -> Result<(), ValidationError> {
        let empty = Map::new();
        let object = match args {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => {
                return Err(ValidationError::new(
                    Rule::Argument,
                    "Arguments must be a JSON object",
                ));
            }
        };

        for param in self.params {
            let value = match object.get(param.name) {
                None | Some(Value::Null) if param.required => {
                    return Err(ValidationError::new(
                        Rule::Argument,
                        format!("Missing required argument: '{}'", param.name),
                    ));
                }
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };

            let (ok, expected) = match param.kind {
                ParamKind::String | ParamKind::Choice(_) => (value.is_string(), "a string"),
                ParamKind::Integer { .. } => (value.is_i64(), "an integer"),
                ParamKind::Boolean => (value.is_boolean(), "a boolean"),
            };
            if !ok {
                return Err(ValidationError::new(
                    Rule::Argument,
                    format!("Argument '{}' must be {}", param.name, expected),
                ));
            }
        }
        Ok(())
    }
}

/// What a command may touch while it runs.
pub struct CommandContext<'a> {
    pub backend: &'a dyn Backend,
    pub store: &'a CredentialStore,
    /// Present for gated commands, absent for exempt ones.
    pub identity: Option<&'a Identity>,
    pub frontend_url: &'a str,
}

impl CommandContext<'_> {
    pub fn identity(&self) -> Result<&Identity, GatewayError> {
        self.identity.ok_or_else(|| {
            GatewayError::Authentication(
                "This command requires a registered identity.".to_string(),
            )
        })
    }

    pub fn credential(&self) -> Result<&str, GatewayError> {
        Ok(self.identity()?.secret.as_str())
    }
}

#[async_trait]
pub trait Command: Send + Sync {
    fn spec(&self) -> &'static CommandSpec;
    async fn execute(
        &self,
        ctx: &CommandContext<'_>,
        args: Value,
    ) -> Result<ToolResponse, CommandError>;
}

/// Deserialize already structurally-checked arguments into a typed struct.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ValidationError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args)
        .map_err(|e| ValidationError::new(Rule::Argument, format!("Invalid arguments: {}", e)))
}
