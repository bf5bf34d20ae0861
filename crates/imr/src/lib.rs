//! # IMR
//!
//! A message router for chat bots. Inbound platform events are normalized
//! into orders, matched against full-string regex routes, bound to typed
//! handler parameters and dispatched concurrently. Handler results become
//! replies handed to a platform sender.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌────────────┐     ┌──────────────────────────┐
//! │ source event │────▶│ OrderFactory │────▶│ RouteTable │────▶│ handler (own task)       │──▶ Sender
//! └──────────────┘     └──────────────┘     └────────────┘────▶│ handler (own task)       │──▶ Sender
//!                                                              └──────────────────────────┘
//! ```
//!
//! - **Core**: `Order`, `Reply`, `OrderFactory`, `Sender`
//! - **Framework**: routes, parameter binding, reply synthesis, the dispatcher
//! - **Runtime**: configuration, logging and the `Client` lifecycle
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use imr::prelude::*;
//!
//! struct Bot;
//!
//! impl Bot {
//!     async fn ping(self: Arc<Self>) -> &'static str {
//!         "pong"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let bot = Arc::new(Bot);
//!     let client = Client::builder()
//!         .order_factory(PassThrough)
//!         .sender(sender)
//!         .register(&bot, [Route::new("ping", Bot::ping).reply(ReplyKind::Words)])?
//!         .build()?;
//!
//!     client.run(orders).await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` (default): TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log lines

pub use imr_core as core;
pub use imr_framework as framework;
pub use imr_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use imr::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use imr_runtime::{Client, ClientBuilder, ConfigLoader, ImrConfig};

    // Data contracts
    pub use imr_core::{
        BoxedSender, FnOrderFactory, JsonOrderFactory, Order, OrderFactory, PassThrough, Reply,
        SendError, SendResult, Sender,
    };

    // Routing and handlers
    pub use imr_framework::{
        AllowAll, AtMentions, Authorizer, HandlerDescriptor, OwnerId, ParamSpec, ReplyKind, Route,
    };

    pub use std::sync::Arc;
}
