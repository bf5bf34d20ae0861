//! # IMR Framework
//!
//! Routing, parameter binding and fan-out dispatch for the IMR message router.
//!
//! This layer provides:
//! - [`RouteTable`]: registration of handler owners and full-string regex routing
//! - [`Handler`]: Axum-style async handlers with typed, declared parameters
//! - [`bind`]: positional parameter binding against an order
//! - [`synthesize`]: handler output to [`Reply`](imr_core::Reply)
//! - [`Dispatcher`]: one tokio task per matched route, with failure isolation
//!
//! Authorization and per-invocation timeouts are tower layers around the
//! [`InvocationService`].

pub mod auth;
pub mod binder;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod route;
pub mod service;
pub mod synth;

pub use auth::{AllowAll, Authorizer};
pub use binder::{AtMentions, BoundArgs, BoundValue, FromBound, bind, tokenize};
pub use descriptor::{HandlerDescriptor, ParamSpec, ReplyKind, RoutePattern, ValueKind};
pub use dispatcher::{DispatchReport, Dispatcher, DispatcherBuilder};
pub use error::{
    BindResult, BindingError, InvocationError, InvocationResult, RegisterError, RegisterResult,
    ResultError, Unauthorized,
};
pub use handler::{ErasedHandler, Handler, HandlerOutput, IntoHandlerOutput};
pub use route::{OwnerId, Route, RouteEntry, RouteTable};
pub use service::{
    AuthorizePredicate, BoxedInvocationService, Delivery, Invocation, InvocationService,
    invocation_service,
};
pub use synth::synthesize;
