//! The invocation pipeline as a tower service.
//!
//! [`InvocationService`] runs one matched handler end to end: bind, call,
//! synthesize, send. Authorization and the optional timeout are ordinary
//! tower layers stacked on top, so the whole pipeline is a single
//! [`BoxedInvocationService`]:
//!
//! ```text
//! Filter<AuthorizePredicate>
//!   └─ Timeout (optional)
//!        └─ InvocationService
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tower::filter::Predicate;
use tower::timeout::TimeoutLayer;
use tower::util::BoxCloneSyncService;
use tower::{BoxError, Service, ServiceBuilder};
use tracing::warn;

use crate::auth::Authorizer;
use crate::binder::bind;
use crate::error::{InvocationResult, Unauthorized};
use crate::route::RouteEntry;
use crate::synth::synthesize;
use imr_core::{BoxedSender, Order};

/// One matched handler paired with the order that matched it.
#[derive(Debug, Clone)]
pub struct Invocation {
    route: Arc<RouteEntry>,
    order: Arc<Order>,
}

impl Invocation {
    pub fn new(route: Arc<RouteEntry>, order: Arc<Order>) -> Self {
        Self { route, order }
    }

    pub fn route(&self) -> &Arc<RouteEntry> {
        &self.route
    }

    pub fn order(&self) -> &Arc<Order> {
        &self.order
    }
}

/// What happened to a successful invocation's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A reply was handed to the sender.
    Sent,
    /// The handler produced a reply but no sender is configured.
    Undelivered,
}

/// The fully layered invocation pipeline.
pub type BoxedInvocationService = BoxCloneSyncService<Invocation, Delivery, BoxError>;

// ============================================================================
// InvocationService
// ============================================================================

/// Binds, calls and replies for a single invocation.
///
/// Errors are [`InvocationError`](crate::InvocationError)s boxed as
/// [`BoxError`].
#[derive(Clone)]
pub struct InvocationService {
    sender: Option<BoxedSender>,
}

impl InvocationService {
    pub fn new(sender: Option<BoxedSender>) -> Self {
        Self { sender }
    }
}

impl Service<Invocation> for InvocationService {
    type Response = Delivery;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<Delivery, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, invocation: Invocation) -> Self::Future {
        let sender = self.sender.clone();
        async move { invoke(invocation, sender).await.map_err(BoxError::from) }.boxed()
    }
}

async fn invoke(
    invocation: Invocation,
    sender: Option<BoxedSender>,
) -> InvocationResult<Delivery> {
    let Invocation { route, order } = invocation;
    let descriptor = route.descriptor();

    let args = bind(descriptor.param_specs(), &order, sender.as_ref())?;
    let output = (route.handler())(args).await?;

    let reply = synthesize(output, descriptor.reply_kind(), &order)?;

    let Some(sender) = sender else {
        warn!(
            owner = descriptor.owner_type(),
            handler = descriptor.name(),
            "No sender configured, reply dropped"
        );
        return Ok(Delivery::Undelivered);
    };

    sender.send(reply).await?;
    Ok(Delivery::Sent)
}

// ============================================================================
// AuthorizePredicate
// ============================================================================

/// A [`Predicate`] that consults an [`Authorizer`].
///
/// Denied invocations are rejected with [`Unauthorized`].
#[derive(Clone)]
pub struct AuthorizePredicate(Arc<dyn Authorizer>);

impl AuthorizePredicate {
    pub fn new(authorizer: Arc<dyn Authorizer>) -> Self {
        Self(authorizer)
    }
}

impl Predicate<Invocation> for AuthorizePredicate {
    type Request = Invocation;

    fn check(&mut self, invocation: Invocation) -> Result<Invocation, BoxError> {
        if self
            .0
            .authorize(invocation.route.descriptor(), &invocation.order)
        {
            Ok(invocation)
        } else {
            Err(Box::new(Unauthorized))
        }
    }
}

/// Builds the layered invocation pipeline.
pub fn invocation_service(
    sender: Option<BoxedSender>,
    authorizer: Arc<dyn Authorizer>,
    timeout: Option<Duration>,
) -> BoxedInvocationService {
    let svc = ServiceBuilder::new()
        .filter(AuthorizePredicate::new(authorizer))
        .option_layer(timeout.map(TimeoutLayer::new))
        .service(InvocationService::new(sender));
    BoxCloneSyncService::new(svc)
}
