//! Client lifecycle: building a dispatcher from configuration and pumping a
//! source stream into it until shutdown.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use imr_runtime::Client;
//!
//! let client = Client::builder()
//!     .order_factory(PassThrough)
//!     .sender(sender)
//!     .register(&owner, routes)?
//!     .build()?;
//!
//! // Runs until Ctrl+C, SIGTERM or the stream ends
//! client.run(events).await;
//! ```

use std::fmt;
use std::future::Future;
use std::pin::pin;
use std::sync::{Arc, Weak};

use futures::{Stream, StreamExt};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, ImrConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use imr_core::{BoxedSender, Order, OrderFactory};
use imr_framework::{
    Authorizer, DispatchReport, Dispatcher, OwnerId, RegisterResult, Route, RouteTable,
};

/// A configured message router.
///
/// Owns the [`Dispatcher`] and the route table behind it. Owners can still be
/// registered and unregistered while the client runs.
pub struct Client<F: OrderFactory> {
    config: ImrConfig,
    dispatcher: Arc<Dispatcher<F>>,
    shutdown: CancellationToken,
}

impl<F: OrderFactory> Client<F> {
    /// Creates a client builder.
    pub fn builder() -> ClientBuilder<F> {
        ClientBuilder::new()
    }

    /// Returns the configuration the client was built with.
    pub fn config(&self) -> &ImrConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher<F>> {
        &self.dispatcher
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        self.dispatcher.routes()
    }

    /// Registers another handler owner.
    pub fn register<O>(
        &self,
        owner: &Arc<O>,
        routes: impl IntoIterator<Item = Route<O>>,
    ) -> RegisterResult<OwnerId>
    where
        O: Send + Sync + 'static,
    {
        let id = self.routes().register(owner, routes)?;
        info!(owner = std::any::type_name::<O>(), id = %id, "Registered handler owner");
        Ok(id)
    }

    /// Removes a handler owner. Returns `false` if it was not registered.
    pub fn unregister(&self, id: OwnerId) -> bool {
        let removed = self.routes().unregister(id);
        if removed {
            info!(id = %id, "Unregistered handler owner");
        }
        removed
    }

    /// Hands one source event to the dispatcher without waiting.
    pub fn receive(&self, source: F::Source) {
        self.dispatcher.receive(source);
    }

    /// Dispatches one source event and waits for every invocation it started.
    pub async fn receive_and_wait(&self, source: F::Source) -> DispatchReport {
        self.dispatcher.receive_and_wait(source).await
    }

    /// Dispatches an already built order without waiting.
    pub fn dispatch_order(&self, order: Order) -> usize {
        self.dispatcher.dispatch_order(order)
    }

    /// Stops a running [`run`](Self::run) loop.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns a token that stops the client when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Pumps `events` into the dispatcher until Ctrl+C or SIGTERM is
    /// received, [`shutdown`](Self::shutdown) is called, or the stream ends.
    pub async fn run<S>(&self, events: S)
    where
        S: Stream<Item = F::Source>,
    {
        self.run_until(events, wait_for_signal()).await;
    }

    /// Like [`run`](Self::run) with a custom shutdown future in place of
    /// process signals.
    ///
    /// Invocations already spawned keep running after this returns.
    pub async fn run_until<S, Fut>(&self, events: S, shutdown: Fut)
    where
        S: Stream<Item = F::Source>,
        Fut: Future<Output = ()>,
    {
        let mut events = pin!(events);
        let mut shutdown = pin!(shutdown);
        let mut received = 0usize;

        info!(
            owners = self.routes().owner_count(),
            routes = self.routes().route_count(),
            "IMR client is now running"
        );

        loop {
            tokio::select! {
                () = self.shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                () = &mut shutdown => {
                    break;
                }
                next = events.next() => match next {
                    Some(source) => {
                        received += 1;
                        self.dispatcher.receive(source);
                    }
                    None => {
                        debug!("Source stream ended");
                        break;
                    }
                },
            }
        }

        info!(received, "IMR client stopped");
    }
}

impl<F: OrderFactory> fmt::Debug for Client<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("dispatcher", &self.dispatcher)
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c() => {}
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// ClientBuilder
// =============================================================================

enum ConfigSource {
    Loader(ConfigLoader),
    Ready(ImrConfig),
}

/// Builder for [`Client`].
///
/// Without an explicit configuration the builder loads one from the current
/// directory and the environment when [`build`](Self::build) is called.
pub struct ClientBuilder<F: OrderFactory> {
    routes: Arc<RouteTable>,
    order_factory: Option<F>,
    sender: Option<BoxedSender>,
    authorizer: Option<Arc<dyn Authorizer>>,
    config: ConfigSource,
    init_logging: bool,
}

impl<F: OrderFactory> ClientBuilder<F> {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(RouteTable::new()),
            order_factory: None,
            sender: None,
            authorizer: None,
            config: ConfigSource::Loader(ConfigLoader::new().with_current_dir()),
            init_logging: true,
        }
    }

    /// Registers a handler owner with its routes.
    pub fn register<O>(
        self,
        owner: &Arc<O>,
        routes: impl IntoIterator<Item = Route<O>>,
    ) -> RuntimeResult<Self>
    where
        O: Send + Sync + 'static,
    {
        self.register_weak(Arc::downgrade(owner), routes)
    }

    /// Registers a handler owner given by weak reference.
    pub fn register_weak<O>(
        self,
        owner: Weak<O>,
        routes: impl IntoIterator<Item = Route<O>>,
    ) -> RuntimeResult<Self>
    where
        O: Send + Sync + 'static,
    {
        self.routes.register_weak(owner, routes)?;
        Ok(self)
    }

    /// Sets how source events become orders. Required.
    pub fn order_factory(mut self, factory: F) -> Self {
        self.order_factory = Some(factory);
        self
    }

    /// Sets the sender replies are delivered through.
    pub fn sender(mut self, sender: BoxedSender) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn authorizer(mut self, authorizer: impl Authorizer) -> Self {
        self.authorizer = Some(Arc::new(authorizer));
        self
    }

    /// Uses `config` as is, skipping file and environment loading.
    pub fn config(mut self, config: ImrConfig) -> Self {
        self.config = ConfigSource::Ready(config);
        self
    }

    /// Loads configuration with `loader` at build time.
    pub fn config_loader(mut self, loader: ConfigLoader) -> Self {
        self.config = ConfigSource::Loader(loader);
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self) -> RuntimeResult<Client<F>> {
        let factory = self
            .order_factory
            .ok_or(RuntimeError::MissingOrderFactory)?;

        let config = match self.config {
            ConfigSource::Loader(loader) => loader.load()?,
            ConfigSource::Ready(config) => {
                crate::config::validate_config(&config)?;
                config
            }
        };

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let mut builder = Dispatcher::builder(self.routes, factory)
            .maybe_invocation_timeout(config.dispatch.invocation_timeout());
        if let Some(sender) = self.sender {
            builder = builder.sender(sender);
        } else {
            warn!("No sender configured, replies will be dropped");
        }
        if let Some(authorizer) = self.authorizer {
            builder = builder.shared_authorizer(authorizer);
        }
        let dispatcher = builder.build();

        info!(
            log_level = %config.logging.level,
            owners = dispatcher.routes().owner_count(),
            routes = dispatcher.routes().route_count(),
            "Client initialized from configuration"
        );

        Ok(Client {
            config,
            dispatcher: Arc::new(dispatcher),
            shutdown: CancellationToken::new(),
        })
    }
}

impl<F: OrderFactory> Default for ClientBuilder<F> {
    fn default() -> Self {
        Self::new()
    }
}
