//! # Signal Relay
//!
//! A connection-broadcast relay for WebRTC signaling. Peers that cannot
//! reach each other directly connect here over WebSocket and every message
//! one peer sends is forwarded to all connected peers, including the sender.
//! Payloads are opaque: anything that parses as JSON is relayed verbatim.
//!
//! ## Modules
//!
//! - [`relay`]: Connection registry, broadcast engine, and lifecycle core
//! - [`api`]: HTTP/WebSocket surface with Axum
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use signal_relay::api;
//! use signal_relay::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default();
//!     api::serve(config).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod relay;

pub use api::{build_router, serve, ApiError, AppState};
pub use config::{Config, ConfigError, LoggingConfig, ServerConfig};
pub use relay::{
    BroadcastReport, Broadcaster, Connection, ConnectionId, ConnectionState, DecodeError,
    LifecycleController, Registry, RegistryError, RelayMessage, SendError,
};
