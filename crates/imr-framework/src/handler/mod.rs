//! Handler system for the IMR framework.
//!
//! - [`traits`]: the [`Handler`] trait, implemented for async functions
//!   taking the owner plus up to twelve bound parameters
//! - [`output`]: [`IntoHandlerOutput`], normalizing handler return values
//!
//! Handlers never see the message directly; they declare what they need via
//! [`ParamSpec`](crate::ParamSpec)s and receive typed arguments.

pub mod output;
pub mod traits;

pub use output::{HandlerOutput, IntoHandlerOutput};
pub use traits::{ErasedHandler, Handler};
