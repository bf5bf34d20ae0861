//! Fan-out dispatch of orders to matching handlers.
//!
//! The [`Dispatcher`] ties the pieces together. For every source event it:
//!
//! 1. wraps the event into an [`Order`] with its [`OrderFactory`]
//!    (`None` ends the pipeline quietly),
//! 2. resolves every matching route in the [`RouteTable`],
//! 3. spawns one tokio task per match, running the
//!    [invocation pipeline](crate::service) independently.
//!
//! Invocations never affect one another. A binding error, a failing handler,
//! or a sender error is logged with the owner and handler that caused it
//! and ends only that invocation.
//!
//! ```rust,ignore
//! let dispatcher = Dispatcher::builder(routes, PassThrough)
//!     .sender(sender)
//!     .invocation_timeout(Duration::from_secs(10))
//!     .build();
//!
//! dispatcher.receive(order);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tower::timeout::error::Elapsed;
use tower::{BoxError, ServiceExt};
use tracing::{Instrument, debug, debug_span, error, info_span, warn};

use crate::auth::{AllowAll, Authorizer};
use crate::descriptor::HandlerDescriptor;
use crate::error::{InvocationError, ResultError, Unauthorized};
use crate::route::RouteTable;
use crate::service::{BoxedInvocationService, Delivery, Invocation, invocation_service};
use imr_core::{BoxedSender, Order, OrderFactory};

// ============================================================================
// DispatchReport
// ============================================================================

/// How one invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Sent,
    Undelivered,
    Skipped,
    Failed,
}

/// Summary of one awaited dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Routes that matched the order.
    pub matched: usize,
    /// Invocations that sent a reply.
    pub sent: usize,
    /// Invocations whose reply was dropped because no sender is configured.
    pub undelivered: usize,
    /// Invocations denied by the authorizer.
    pub skipped: usize,
    /// Invocations that failed or timed out.
    pub failed: usize,
}

impl DispatchReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::Undelivered => self.undelivered += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// Returns `true` if no invocation failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for DispatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "matched={} sent={} undelivered={} skipped={} failed={}",
            self.matched, self.sent, self.undelivered, self.skipped, self.failed
        )
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes orders produced by `F` to every matching handler.
pub struct Dispatcher<F: OrderFactory> {
    routes: Arc<RouteTable>,
    factory: F,
    service: BoxedInvocationService,
}

impl<F: OrderFactory> Dispatcher<F> {
    /// Creates a dispatcher with no sender, no timeout and [`AllowAll`].
    pub fn new(routes: Arc<RouteTable>, factory: F) -> Self {
        Self::builder(routes, factory).build()
    }

    pub fn builder(routes: Arc<RouteTable>, factory: F) -> DispatcherBuilder<F> {
        DispatcherBuilder {
            routes,
            factory,
            sender: None,
            authorizer: Arc::new(AllowAll),
            timeout: None,
        }
    }

    /// The route table this dispatcher resolves against.
    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Dispatches a source event without waiting for the handlers.
    ///
    /// Returns as soon as the invocations are spawned. Must be called from
    /// within a tokio runtime; otherwise the order is dropped with an error.
    pub fn receive(&self, source: F::Source) {
        if let Some(order) = self.wrap(source) {
            self.dispatch_order(order);
        }
    }

    /// Dispatches an order without waiting for the handlers.
    ///
    /// Returns the number of invocations spawned.
    pub fn dispatch_order(&self, order: Order) -> usize {
        self.spawn_all(order).len()
    }

    /// Dispatches a source event and waits for every invocation to finish.
    pub async fn receive_and_wait(&self, source: F::Source) -> DispatchReport {
        match self.wrap(source) {
            Some(order) => self.dispatch_order_and_wait(order).await,
            None => DispatchReport::default(),
        }
    }

    /// Dispatches an order and waits for every invocation to finish.
    pub async fn dispatch_order_and_wait(&self, order: Order) -> DispatchReport {
        let handles = self.spawn_all(order);
        let mut report = DispatchReport {
            matched: handles.len(),
            ..Default::default()
        };

        for joined in join_all(handles).await {
            match joined {
                Ok(outcome) => report.record(outcome),
                Err(e) => {
                    error!(error = %e, "Invocation task panicked or was cancelled");
                    report.record(Outcome::Failed);
                }
            }
        }

        debug!(%report, "Dispatch finished");
        report
    }

    fn wrap(&self, source: F::Source) -> Option<Order> {
        let order = self.factory.wrap_source(source);
        if order.is_none() {
            debug!("Source event filtered out by order factory");
        }
        order
    }

    fn spawn_all(&self, order: Order) -> Vec<JoinHandle<Outcome>> {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Dispatch requires a tokio runtime, order dropped");
                return Vec::new();
            }
        };

        let span = info_span!(
            "dispatch",
            group = order.group_id(),
            sender = order.sender_id()
        );
        let _enter = span.enter();

        let order = Arc::new(order);
        let matches = self.routes.find_matches(order.message());
        debug!(match_count = matches.len(), "Dispatching order");

        matches
            .into_iter()
            .map(|route| {
                let descriptor = route.descriptor();
                let invocation_span = debug_span!(
                    "invoke",
                    owner = descriptor.owner_type(),
                    handler = descriptor.name()
                );
                let svc = self.service.clone();
                let invocation = Invocation::new(route, Arc::clone(&order));
                handle.spawn(run_invocation(svc, invocation).instrument(invocation_span))
            })
            .collect()
    }
}

impl<F: OrderFactory> fmt::Debug for Dispatcher<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

async fn run_invocation(service: BoxedInvocationService, invocation: Invocation) -> Outcome {
    let route = Arc::clone(invocation.route());
    match service.oneshot(invocation).await {
        Ok(Delivery::Sent) => {
            debug!("Reply sent");
            Outcome::Sent
        }
        Ok(Delivery::Undelivered) => Outcome::Undelivered,
        Err(e) => classify(e, route.descriptor()),
    }
}

fn classify(err: BoxError, descriptor: &HandlerDescriptor) -> Outcome {
    let owner = descriptor.owner_type();
    let handler = descriptor.name();

    if err.is::<Unauthorized>() {
        debug!(owner, handler, "Invocation denied by authorizer");
        return Outcome::Skipped;
    }

    if err.is::<Elapsed>() {
        warn!(owner, handler, "Invocation timed out");
        return Outcome::Failed;
    }

    match err.downcast_ref::<InvocationError>() {
        Some(e @ InvocationError::Result(ResultError::NilResult)) => {
            warn!(owner, handler, error = %e, "Handler returned no result");
        }
        Some(e @ InvocationError::Result(ResultError::UnsupportedResultType { .. })) => {
            warn!(owner, handler, error = %e, "Handler result cannot be sent");
        }
        Some(e) => error!(owner, handler, error = %e, "Invocation failed"),
        None => error!(owner, handler, error = %err, "Invocation failed"),
    }
    Outcome::Failed
}

// ============================================================================
// DispatcherBuilder
// ============================================================================

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder<F> {
    routes: Arc<RouteTable>,
    factory: F,
    sender: Option<BoxedSender>,
    authorizer: Arc<dyn Authorizer>,
    timeout: Option<Duration>,
}

impl<F: OrderFactory> DispatcherBuilder<F> {
    /// Sets the sender replies are delivered through.
    pub fn sender(mut self, sender: BoxedSender) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Sets the authorizer consulted before each invocation.
    pub fn authorizer(mut self, authorizer: impl Authorizer) -> Self {
        self.authorizer = Arc::new(authorizer);
        self
    }

    /// Sets an authorizer that is already shared.
    pub fn shared_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Bounds each invocation (handler plus send) to `timeout`.
    pub fn invocation_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets or clears the per-invocation timeout.
    pub fn maybe_invocation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Dispatcher<F> {
        Dispatcher {
            routes: self.routes,
            factory: self.factory,
            service: invocation_service(self.sender, self.authorizer, self.timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{ParamSpec, ReplyKind};
    use crate::route::Route;
    use async_trait::async_trait;
    use imr_core::{FnOrderFactory, PassThrough, Reply, SendResult, Sender};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    #[derive(Default)]
    struct RecordingSender {
        replies: Mutex<Vec<Reply>>,
    }

    #[async_trait]
    impl Sender for RecordingSender {
        async fn send(&self, reply: Reply) -> SendResult<()> {
            self.replies.lock().push(reply);
            Ok(())
        }
    }

    struct ChannelSender(mpsc::UnboundedSender<Reply>);

    #[async_trait]
    impl Sender for ChannelSender {
        async fn send(&self, reply: Reply) -> SendResult<()> {
            self.0
                .send(reply)
                .map_err(|_| imr_core::SendError::Closed)
        }
    }

    struct Pinger;

    impl Pinger {
        async fn ping(self: Arc<Self>) -> &'static str {
            "pong"
        }

        async fn fail(self: Arc<Self>) -> Result<String, String> {
            Err("boom".into())
        }

        async fn slow(self: Arc<Self>) -> &'static str {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "late"
        }

        async fn nothing(self: Arc<Self>) {}

        async fn sum(self: Arc<Self>, a: i32, b: i32) -> String {
            (a + b).to_string()
        }
    }

    fn order(message: &str) -> Order {
        Order::new(message, 42, 7, "alice").unwrap()
    }

    fn table(routes: Vec<Route<Pinger>>) -> (Arc<RouteTable>, Arc<Pinger>) {
        let table = Arc::new(RouteTable::new());
        let owner = Arc::new(Pinger);
        table.register(&owner, routes).unwrap();
        (table, owner)
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (routes, _owner) = table(vec![
            Route::new("^ping$", Pinger::ping).reply(ReplyKind::Words),
        ]);
        let recorder = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::builder(routes, PassThrough)
            .sender(recorder.clone())
            .build();

        let report = dispatcher.receive_and_wait(order("ping")).await;
        assert_eq!(report.matched, 1);
        assert_eq!(report.sent, 1);
        assert_eq!(*recorder.replies.lock(), vec![Reply::plain("pong", 42)]);

        let report = dispatcher.receive_and_wait(order("ping!")).await;
        assert_eq!(report, DispatchReport::default());
        assert_eq!(recorder.replies.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_does_not_suppress_siblings() {
        let (routes, _owner) = table(vec![
            Route::new("", Pinger::fail),
            Route::new("", Pinger::ping).reply(ReplyKind::Words),
            Route::new(r"\S+ \S+", Pinger::sum)
                .params([ParamSpec::TokenIndexAsInt(0), ParamSpec::TokenIndexAsInt(1)]),
        ]);
        let recorder = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::builder(routes, PassThrough)
            .sender(recorder.clone())
            .build();

        let report = dispatcher.receive_and_wait(order("add x")).await;
        assert_eq!(report.matched, 3);
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 2);
        assert!(!report.is_clean());
        assert_eq!(*recorder.replies.lock(), vec![Reply::plain("pong", 42)]);
    }

    #[tokio::test]
    async fn test_service_reply_by_default() {
        let (routes, _owner) = table(vec![
            Route::new(r"-?\d+ -?\d+", Pinger::sum)
                .params([ParamSpec::TokenIndexAsInt(0), ParamSpec::TokenIndexAsInt(1)]),
        ]);
        let recorder = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::builder(routes, PassThrough)
            .sender(recorder.clone())
            .build();

        let report = dispatcher.receive_and_wait(order("2 -5")).await;
        assert_eq!(report.sent, 1);
        assert_eq!(*recorder.replies.lock(), vec![Reply::service("-3", 42, 1)]);
    }

    #[tokio::test]
    async fn test_fire_and_forget() {
        let (routes, _owner) = table(vec![
            Route::new("^ping$", Pinger::ping).reply(ReplyKind::Words),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::builder(routes, PassThrough)
            .sender(Arc::new(ChannelSender(tx)))
            .build();

        dispatcher.receive(order("ping"));
        assert_eq!(rx.recv().await, Some(Reply::plain("pong", 42)));
        assert_eq!(dispatcher.dispatch_order(order("pong")), 0);
    }

    #[tokio::test]
    async fn test_denied_invocations_are_skipped() {
        let (routes, _owner) = table(vec![
            Route::new("", Pinger::ping).name("open").reply(ReplyKind::Words),
            Route::new("", Pinger::ping).name("admin").reply(ReplyKind::Words),
        ]);
        let recorder = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::builder(routes, PassThrough)
            .sender(recorder.clone())
            .authorizer(|d: &HandlerDescriptor, o: &Order| {
                d.name() != "admin" || o.sender_id() == 1
            })
            .build();

        let report = dispatcher.receive_and_wait(order("hi")).await;
        assert_eq!(report.matched, 2);
        assert_eq!(report.sent, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_invocation_timeout() {
        let (routes, _owner) = table(vec![
            Route::new("", Pinger::slow).reply(ReplyKind::Words),
            Route::new("", Pinger::ping).reply(ReplyKind::Words),
        ]);
        let recorder = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::builder(routes, PassThrough)
            .sender(recorder.clone())
            .invocation_timeout(Duration::from_millis(20))
            .build();

        let report = dispatcher.receive_and_wait(order("hi")).await;
        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(*recorder.replies.lock(), vec![Reply::plain("pong", 42)]);
    }

    #[tokio::test]
    async fn test_slow_handler_does_not_block_sibling() {
        let (routes, _owner) = table(vec![
            Route::new("", Pinger::slow).reply(ReplyKind::Words),
            Route::new("", Pinger::ping).reply(ReplyKind::Words),
        ]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::builder(routes, PassThrough)
            .sender(Arc::new(ChannelSender(tx)))
            .build();

        assert_eq!(dispatcher.dispatch_order(order("hi")), 2);
        let reply = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert_eq!(reply.unwrap(), Some(Reply::plain("pong", 42)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_nil_result_counts_as_failure() {
        let (routes, _owner) = table(vec![
            Route::new("", Pinger::nothing),
            Route::new("", Pinger::ping).reply(ReplyKind::Words),
        ]);
        let recorder = Arc::new(RecordingSender::default());
        let dispatcher = Dispatcher::builder(routes, PassThrough)
            .sender(recorder.clone())
            .build();

        let report = dispatcher.receive_and_wait(order("x")).await;
        assert_eq!(report.matched, 2);
        assert_eq!(report.sent, 1);
        assert_eq!(report.undelivered, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(*recorder.replies.lock(), vec![Reply::plain("pong", 42)]);
    }

    #[tokio::test]
    async fn test_filtered_source() {
        let (routes, _owner) = table(vec![Route::new("", Pinger::ping)]);
        let factory = FnOrderFactory::new(|line: String| Order::new(line, 1, 2, "console").ok());
        let dispatcher = Dispatcher::new(routes, factory);

        let report = dispatcher.receive_and_wait(String::new()).await;
        assert_eq!(report, DispatchReport::default());

        // Without a sender the reply is dropped but the handler still runs.
        let report = dispatcher.receive_and_wait("hello".to_string()).await;
        assert_eq!(report.matched, 1);
        assert_eq!(report.undelivered, 1);
    }

    #[test]
    fn test_without_runtime() {
        let (routes, _owner) = table(vec![Route::new("", Pinger::ping)]);
        let dispatcher = Dispatcher::new(routes, PassThrough);
        assert_eq!(dispatcher.dispatch_order(order("hi")), 0);
    }
}
