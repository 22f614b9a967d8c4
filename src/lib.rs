//! tradegate - local command gateway for the trading arena
//!
//! This crate provides:
//! - Credential lifecycle: OS keychain storage with an owner-only file fallback
//! - Access gate and command dispatcher in front of the trading backend
//! - Input validators and the error taxonomy shared by every command
//! - MCP transports over stdio and HTTP

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod paths;
pub mod security;
pub mod server;

pub use config::Config;
pub use error::{ErrorKind, GatewayError};
pub use gateway::{Dispatcher, ToolResponse};
