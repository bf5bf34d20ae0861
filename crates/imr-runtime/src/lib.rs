//! IMR Runtime - Configuration, logging and client lifecycle for the IMR
//! message router.
//!
//! This crate provides:
//! - Layered configuration loading (`ConfigLoader`, `ImrConfig`)
//! - Logging setup on top of `tracing-subscriber` (`LoggingBuilder`)
//! - The [`Client`], which builds a dispatcher from configuration and pumps
//!   a source stream into it until shutdown
//!
//! ```ignore
//! use imr_runtime::Client;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::builder()
//!         .order_factory(PassThrough)
//!         .sender(sender)
//!         .register(&owner, routes)?
//!         .build()?;
//!
//!     // Run until Ctrl+C or the stream ends
//!     client.run(events).await;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `toml-config` (default): `imr.toml` / `config.toml` files
//! - `yaml-config`: `imr.yaml` / `config.yaml` files
//! - `json-log`: the `json` log format

pub mod client;
pub mod config;
pub mod error;
pub mod logging;

// Re-exports
pub use client::{Client, ClientBuilder};
pub use config::{ConfigError, ConfigLoader, ConfigResult, ImrConfig, Profile};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, LoggingError, SpanEvents};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides the commonly used logging macros and the `instrument`
/// attribute.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
