//! Error taxonomy and the single mapping from internal failures to what the
//! caller sees.
//!
//! Handlers never format error text for the caller themselves. They return a
//! [`GatewayError`] (optionally wrapped in a [`CommandError`] with guidance),
//! and [`ErrorReporter::report`] turns it into a [`ToolResponse`] according to
//! the configured [`RuntimeMode`].

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::config::RuntimeMode;
use crate::gateway::ToolResponse;
use crate::identity::StoreError;
use crate::security::{SecurityEvent, SecurityLog, ValidationError, redact_secrets};

/// Closed set of failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Validation,
    NotFound,
    BackendFailure,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Authentication(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("{0}")]
    Unknown(String),
}

impl GatewayError {
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Backend {
            status,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Authentication(_) => ErrorKind::Authentication,
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::Backend { .. } => ErrorKind::BackendFailure,
            GatewayError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::Authentication(_) => Some(401),
            GatewayError::Validation(_) => Some(400),
            GatewayError::NotFound(_) => Some(404),
            GatewayError::Backend { status, .. } => Some(*status),
            GatewayError::Unknown(_) => None,
        }
    }
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        GatewayError::Unknown(format!("Local identity storage failed: {}", e))
    }
}

/// A handler failure plus optional follow-up instructions for the caller.
///
/// Guidance is shown regardless of mode, so it must never contain internal
/// detail or credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandError {
    pub error: GatewayError,
    pub guidance: Option<String>,
}

impl CommandError {
    pub fn with_guidance(error: impl Into<GatewayError>, guidance: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            guidance: Some(guidance.into()),
        }
    }
}

impl From<GatewayError> for CommandError {
    fn from(error: GatewayError) -> Self {
        Self {
            error,
            guidance: None,
        }
    }
}

impl From<ValidationError> for CommandError {
    fn from(e: ValidationError) -> Self {
        GatewayError::from(e).into()
    }
}

impl From<StoreError> for CommandError {
    fn from(e: StoreError) -> Self {
        GatewayError::from(e).into()
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

const BACKEND_UNAVAILABLE: &str = "Backend service temporarily unavailable. Please try again.";

/// Maps errors to caller-facing results and records them.
#[derive(Debug, Clone)]
pub struct ErrorReporter {
    mode: RuntimeMode,
    log: Option<SecurityLog>,
}

impl ErrorReporter {
    pub fn new(mode: RuntimeMode, log: Option<SecurityLog>) -> Self {
        Self { mode, log }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Log the failure with full (redacted) detail and build the caller's result.
    pub async fn report(&self, failure: &CommandError, source: &str) -> ToolResponse {
        let error_id = uuid::Uuid::new_v4().to_string();
        let err = &failure.error;
        let detail = redact_secrets(&err.to_string());

        match err.kind() {
            ErrorKind::Unknown => {
                error!(command = source, error_id = %error_id, "Unexpected error: {}", detail)
            }
            kind => warn!(
                command = source,
                kind = ?kind,
                status = ?err.status_code(),
                "Command failed: {}",
                detail
            ),
        }

        if let Some(ref log) = self.log {
            let event =
                SecurityEvent::new(err.kind(), err.status_code(), &detail, &error_id, source);
            if let Err(e) = log.append(&event).await {
                warn!("Failed to write security log: {}", e);
            }
        }

        let mut text = self.user_message(err, &error_id);
        if let Some(ref guidance) = failure.guidance {
            text.push_str("\n\n");
            text.push_str(guidance);
        }
        ToolResponse::error(redact_secrets(&text))
    }

    /// Caller-facing text for an error. Authentication, validation and
    /// not-found messages are always shown; backend and unexpected detail
    /// only in permissive mode.
    pub fn user_message(&self, err: &GatewayError, error_id: &str) -> String {
        let permissive = self.mode.is_permissive();
        match err {
            GatewayError::Authentication(message) => message.clone(),
            GatewayError::Validation(e) => format!("Validation error: {}", e),
            GatewayError::NotFound(message) => format!("Not found: {}", message),
            GatewayError::Backend { status, message } if permissive => {
                format!("Backend error ({}): {}", status, message)
            }
            GatewayError::Backend { .. } => BACKEND_UNAVAILABLE.to_string(),
            GatewayError::Unknown(message) if permissive => {
                format!("Unexpected error: {} (error ID: {})", message, error_id)
            }
            GatewayError::Unknown(_) => format!(
                "An unexpected error occurred. Please try again or contact support with error ID: {}",
                error_id
            ),
        }
    }
}
