//! Transports. Both speak the same JSON-RPC handler and share one dispatcher.

mod http;
pub mod rpc;
mod stdio;

pub use http::{Server, router};
pub use stdio::{serve_stdio, serve_streams};
