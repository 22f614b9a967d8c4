//! Security surface of the gateway.
//!
//! - [`validator`]: argument rules applied before any backend call
//! - [`audit`]: append-only JSONL log of security-relevant failures
//! - [`redact`]: scrubbing of credentials from anything that gets logged

mod audit;
mod redact;
pub mod validator;

pub use audit::{SecurityEvent, SecurityLog, read_events};
pub use redact::redact_secrets;
pub use validator::{
    AlertStatus, ArenaFrequency, MessageViolation, Persona, PositionStatus, Rule, Strategy,
    TradingStyle, ValidationError, validate_credential_format,
};
