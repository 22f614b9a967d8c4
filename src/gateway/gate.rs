//! Authentication gate in front of every gated command.

use tracing::debug;

use super::command::{Access, CommandSpec};
use crate::error::GatewayError;
use crate::identity::Identity;
use crate::security::validate_credential_format;

pub const NOT_REGISTERED: &str = "ACCESS DENIED: You are not registered with the trading arena.\n\n\
Call 'register_agent' first, for example:\n\
register_agent(username=\"your_name\", agent_name=\"YourBot\", strategy=\"moderate\")\n\n\
Call 'get_registration_options' to see every available setting.";

pub const INVALID_STORED_KEY: &str = "ACCESS DENIED: The stored API key is malformed.\n\n\
Run 'tradegate identity clear' and call 'register_agent' again.";

/// Stage a request has reached. Stages only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RequestPhase {
    Received,
    /// A stored identity was loaded.
    Authenticated,
    /// Stored credential passed the format check, or none was needed.
    Authorized,
    /// Arguments passed the structural check.
    Validated,
    Executing,
    Completed,
    Failed,
}

/// Per-request phase tracker, logged at debug level.
#[derive(Debug)]
pub struct RequestTrace {
    command: &'static str,
    phase: RequestPhase,
}

impl RequestTrace {
    pub fn new(command: &'static str) -> Self {
        debug!(command, phase = ?RequestPhase::Received, "Request received");
        Self {
            command,
            phase: RequestPhase::Received,
        }
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn advance(&mut self, next: RequestPhase) {
        debug_assert!(
            next > self.phase,
            "request phase went backwards: {:?} -> {:?}",
            self.phase,
            next
        );
        debug!(command = self.command, from = ?self.phase, to = ?next, "Request phase");
        self.phase = next;
    }

    pub fn fail(&mut self) {
        if self.phase != RequestPhase::Failed {
            self.advance(RequestPhase::Failed);
        }
    }
}

/// Outcome of the gate for a command that may run.
#[derive(Debug, Clone, PartialEq)]
pub enum Authorization {
    /// Command does not need an identity.
    Exempt,
    Authorized(Identity),
}

impl Authorization {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            Authorization::Exempt => None,
            Authorization::Authorized(identity) => Some(identity),
        }
    }
}

pub struct AccessGate;

impl AccessGate {
    /// Decide whether `spec` may run with the loaded identity.
    ///
    /// The stored key's format is checked on every call, not just at
    /// registration, so a damaged identity file blocks gated commands.
    pub fn authorize(
        spec: &CommandSpec,
        identity: Option<Identity>,
    ) -> Result<Authorization, GatewayError> {
        if spec.access == Access::Exempt {
            return Ok(Authorization::Exempt);
        }

        let Some(identity) = identity else {
            return Err(GatewayError::Authentication(NOT_REGISTERED.to_string()));
        };

        if !validate_credential_format(&identity.secret) {
            return Err(GatewayError::Authentication(INVALID_STORED_KEY.to_string()));
        }

        Ok(Authorization::Authorized(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "ci_u12345678_abcdefABCDEF0123456789abcdefABCDEF01";

    static GATED: CommandSpec = CommandSpec {
        name: "gated",
        description: "",
        access: Access::Gated,
        params: &[],
    };

    static EXEMPT: CommandSpec = CommandSpec {
        name: "exempt",
        description: "",
        access: Access::Exempt,
        params: &[],
    };

    fn identity(secret: &str) -> Identity {
        Identity::new("alice".into(), "u-1".into(), secret.into())
    }

    #[test]
    fn exempt_commands_pass_without_identity() {
        assert_eq!(
            AccessGate::authorize(&EXEMPT, None).unwrap(),
            Authorization::Exempt
        );
    }

    #[test]
    fn gated_commands_require_identity() {
        let err = AccessGate::authorize(&GATED, None).unwrap_err();
        assert!(matches!(err, GatewayError::Authentication(ref m) if m.contains("register_agent")));
    }

    #[test]
    fn malformed_stored_key_is_denied() {
        let err = AccessGate::authorize(&GATED, Some(identity("ci_short"))).unwrap_err();
        assert!(matches!(err, GatewayError::Authentication(ref m) if m.contains("malformed")));
    }

    #[test]
    fn well_formed_key_is_authorized() {
        let auth = AccessGate::authorize(&GATED, Some(identity(KEY))).unwrap();
        assert_eq!(auth.identity().unwrap().username, "alice");
    }

    #[test]
    fn trace_moves_forward() {
        let mut trace = RequestTrace::new("gated");
        trace.advance(RequestPhase::Authenticated);
        assert!(RequestPhase::Authenticated < RequestPhase::Authorized);
        trace.advance(RequestPhase::Authorized);
        trace.advance(RequestPhase::Validated);
        trace.fail();
        trace.fail();
        assert_eq!(trace.phase(), RequestPhase::Failed);
    }
}
