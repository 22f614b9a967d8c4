//! Command dispatch: lookup, access gate, argument check, execution and
//! error mapping, in that order.

pub mod command;
mod commands;
mod gate;
mod response;

pub use command::{Access, Command, CommandContext, CommandSpec, Param, ParamKind};
pub use commands::{ORPHANED_ACCOUNT_HINT, default_commands, is_username_taken};
pub use gate::{AccessGate, Authorization, RequestPhase, RequestTrace};
pub use response::{Content, ToolResponse};

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::{Backend, BackendClient};
use crate::config::Config;
use crate::error::{CommandError, ErrorReporter};
use crate::identity::CredentialStore;
use crate::security::{Rule, SecurityLog, ValidationError};

/// Security log source for names outside the registry.
const UNKNOWN_COMMAND_SOURCE: &str = "unknown_command";

/// Entry point for every command, whatever transport it arrived on.
///
/// Holds no per-request state; concurrent dispatches share it freely.
pub struct Dispatcher {
    commands: Vec<Box<dyn Command>>,
    store: Arc<CredentialStore>,
    backend: Arc<dyn Backend>,
    reporter: ErrorReporter,
    frontend_url: String,
}

impl Dispatcher {
    pub fn new(
        store: Arc<CredentialStore>,
        backend: Arc<dyn Backend>,
        reporter: ErrorReporter,
        frontend_url: impl Into<String>,
    ) -> Self {
        Self {
            commands: default_commands(),
            store,
            backend,
            reporter,
            frontend_url: frontend_url.into(),
        }
    }

    /// Wire the real backend client, credential store and security log from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let file = config.identity_file();
        let store = if config.identity.use_vault {
            CredentialStore::with_keyring(file)
        } else {
            CredentialStore::file_only(file)
        };
        let backend = BackendClient::from_config(config)?;
        let reporter = ErrorReporter::new(
            config.security.mode,
            Some(SecurityLog::new(config.paths.security_log())),
        );

        info!(
            backend = %config.backend.url,
            mode = %config.security.mode,
            identity = %config.identity_file().display(),
            "Gateway ready"
        );

        Ok(Self::new(
            Arc::new(store),
            Arc::new(backend),
            reporter,
            config.backend.frontend_url.clone(),
        ))
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn specs(&self) -> impl Iterator<Item = &'static CommandSpec> + '_ {
        self.commands.iter().map(|c| c.spec())
    }

    /// Capability advertisement: one descriptor per command.
    pub fn descriptors(&self) -> Vec<Value> {
        self.specs().map(CommandSpec::descriptor).collect()
    }

    fn find(&self, name: &str) -> Option<&dyn Command> {
        self.commands
            .iter()
            .find(|c| c.spec().name == name)
            .map(|c| c.as_ref())
    }

    /// Run a command and always produce a structured result.
    pub async fn dispatch(&self, name: &str, args: Value) -> ToolResponse {
        let Some(command) = self.find(name) else {
            warn!(command = name, "Unknown command");
            let failure = CommandError::from(ValidationError::new(
                Rule::Command,
                format!("Unknown command: {}", name),
            ));
            return self.reporter.report(&failure, UNKNOWN_COMMAND_SOURCE).await;
        };

        let spec = command.spec();
        let mut trace = RequestTrace::new(spec.name);
        match self.run(command, args, &mut trace).await {
            Ok(response) => {
                trace.advance(RequestPhase::Completed);
                response
            }
            Err(failure) => {
                trace.fail();
                self.reporter.report(&failure, spec.name).await
            }
        }
    }

    async fn run(
        &self,
        command: &dyn Command,
        args: Value,
        trace: &mut RequestTrace,
    ) -> Result<ToolResponse, CommandError> {
        let spec = command.spec();

        // Exempt commands never touch local identity state.
        let authorization = match spec.access {
            Access::Exempt => Authorization::Exempt,
            Access::Gated => {
                let identity = self.store.load().await?;
                if identity.is_some() {
                    trace.advance(RequestPhase::Authenticated);
                }
                AccessGate::authorize(spec, identity)?
            }
        };
        trace.advance(RequestPhase::Authorized);

        spec.check_arguments(&args)?;
        trace.advance(RequestPhase::Validated);

        let ctx = CommandContext {
            backend: self.backend.as_ref(),
            store: &self.store,
            identity: authorization.identity(),
            frontend_url: &self.frontend_url,
        };
        trace.advance(RequestPhase::Executing);
        command.execute(&ctx, args).await
    }
}
