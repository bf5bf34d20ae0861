//! # IMR Core
//!
//! Data contracts shared by every layer of the IMR message router.
//!
//! - [`Order`]: the normalized inbound message every platform event is reduced to
//! - [`OrderFactory`]: turns raw platform events into orders (or filters them out)
//! - [`Reply`]: the outbound message produced by a handler
//! - [`Sender`]: delivers replies back to the platform
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌────────────┐     ┌──────────┐
//! │ source event │────▶│ OrderFactory │────▶│ Dispatcher │────▶│  Sender  │
//! └──────────────┘     └──────────────┘     └────────────┘     └──────────┘
//! ```
//!
//! The dispatcher itself lives in `imr-framework`.

pub mod error;
pub mod factory;
pub mod order;
pub mod reply;

pub use error::{OrderError, OrderResult, SendError, SendResult};
pub use factory::{FnOrderFactory, JsonOrderFactory, OrderFactory, PassThrough};
pub use order::Order;
pub use reply::{BoxedSender, Reply, Sender};
