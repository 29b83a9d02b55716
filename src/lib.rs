//! Host side of the browser-automation bridge: a WebSocket endpoint for
//! tool-calling clients in front of the [`cdp_client`] session layer.

pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod errors;
pub mod paths;
pub mod server;
pub mod sessions;
pub mod tools;

pub use config::BridgeConfig;
pub use dispatch::{ClientId, Dispatcher};
pub use envelope::{Direction, Envelope, ToolCall};
pub use errors::{BridgeError, BridgeResult};
pub use server::{router, ServeState};
pub use sessions::SessionHub;
