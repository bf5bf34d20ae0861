//! Route registration and resolution.
//!
//! The [`RouteTable`] holds every registered handler, grouped by the object
//! that owns it. Owners are registered once, usually before the first
//! message arrives:
//!
//! ```rust,ignore
//! let table = RouteTable::new();
//! let greeter = Arc::new(Greeter::default());
//!
//! table.register(&greeter, [
//!     Route::new("^ping$", Greeter::ping).reply(ReplyKind::Words),
//!     Route::new(r"hello \S+", Greeter::hello)
//!         .param(ParamSpec::TokenIndex(1))
//!         .reply(ReplyKind::Words),
//! ])?;
//!
//! for entry in table.find_matches("hello bob") {
//!     // ...
//! }
//! ```
//!
//! # Ownership
//!
//! The table holds owners **weakly**. Once the last `Arc` to an owner is
//! dropped its routes stop matching, and the entry is pruned on the next
//! registration. An invocation already in flight when that happens fails with
//! [`InvocationError::OwnerDropped`](crate::InvocationError::OwnerDropped).
//!
//! # Concurrency
//!
//! Registration takes a write lock and resolution a read lock, so
//! registering while messages are flowing is safe. The intended use is
//! still register-then-freeze.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use parking_lot::RwLock;
use tracing::{debug, info, trace};

use crate::binder::BoundArgs;
use crate::descriptor::{HandlerDescriptor, ParamSpec, ReplyKind, RoutePattern, ValueKind};
use crate::error::{InvocationError, RegisterError, RegisterResult};
use crate::handler::{ErasedHandler, Handler};

// ============================================================================
// OwnerId
// ============================================================================

/// Identity of a registered owner.
///
/// Two `Arc`s to the same allocation have the same id.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerId(usize);

impl OwnerId {
    fn of<O>(owner: &Weak<O>) -> Self {
        Self(owner.as_ptr() as *const () as usize)
    }
}

impl fmt::Debug for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OwnerId({:#x})", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

// ============================================================================
// Route (builder)
// ============================================================================

/// A handler declaration for an owner of type `O`.
///
/// Nothing is validated until the route is passed to
/// [`RouteTable::register`].
pub struct Route<O> {
    pattern: String,
    name: String,
    params: Vec<ParamSpec>,
    reply_kind: ReplyKind,
    kinds: Vec<ValueKind>,
    bind_owner: Box<dyn FnOnce(Weak<O>) -> ErasedHandler + Send>,
}

impl<O: Send + Sync + 'static> Route<O> {
    /// Declares `handler` for messages matching `pattern`.
    ///
    /// An empty pattern matches every message. The handler name defaults to
    /// the handler's type name.
    pub fn new<H, T>(pattern: impl Into<String>, handler: H) -> Self
    where
        H: Handler<O, T>,
        T: 'static,
    {
        Self {
            pattern: pattern.into(),
            name: type_name::<H>().to_string(),
            params: Vec::new(),
            reply_kind: ReplyKind::default(),
            kinds: H::param_kinds(),
            bind_owner: Box::new(move |owner: Weak<O>| -> ErasedHandler {
                Arc::new(move |args: BoundArgs| match owner.upgrade() {
                    Some(owner) => <H as Handler<O, T>>::call(handler.clone(), owner, args),
                    None => futures::future::ready(Err(InvocationError::OwnerDropped)).boxed(),
                })
            }),
        }
    }

    /// Sets the handler name used in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Appends one parameter spec.
    pub fn param(mut self, spec: ParamSpec) -> Self {
        self.params.push(spec);
        self
    }

    /// Appends several parameter specs.
    pub fn params(mut self, specs: impl IntoIterator<Item = ParamSpec>) -> Self {
        self.params.extend(specs);
        self
    }

    /// Sets how a textual result becomes a reply.
    pub fn reply(mut self, kind: ReplyKind) -> Self {
        self.reply_kind = kind;
        self
    }

    fn validate(&self) -> RegisterResult<RoutePattern> {
        let pattern =
            RoutePattern::new(self.pattern.as_str()).map_err(|e| RegisterError::InvalidPattern {
                handler: self.name.clone(),
                pattern: self.pattern.clone(),
                reason: e.to_string(),
            })?;

        if self.params.len() != self.kinds.len() {
            return Err(RegisterError::ArityMismatch {
                handler: self.name.clone(),
                expected: self.kinds.len(),
                declared: self.params.len(),
            });
        }

        for (position, (spec, expected)) in self.params.iter().zip(&self.kinds).enumerate() {
            if spec.kind() != *expected {
                return Err(RegisterError::ParamMismatch {
                    handler: self.name.clone(),
                    position,
                    spec: *spec,
                    expected: *expected,
                    got: spec.kind(),
                });
            }
        }

        Ok(pattern)
    }
}

impl<O> fmt::Debug for Route<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern)
            .field("name", &self.name)
            .field("params", &self.params)
            .field("reply_kind", &self.reply_kind)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RouteEntry
// ============================================================================

/// A registered handler: its descriptor plus the callable.
pub struct RouteEntry {
    descriptor: HandlerDescriptor,
    handler: ErasedHandler,
}

impl RouteEntry {
    pub fn descriptor(&self) -> &HandlerDescriptor {
        &self.descriptor
    }

    pub fn handler(&self) -> &ErasedHandler {
        &self.handler
    }
}

impl fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteEntry")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// RouteTable
// ============================================================================

struct OwnerEntry {
    id: OwnerId,
    type_name: &'static str,
    liveness: Weak<dyn Any + Send + Sync>,
    routes: Vec<Arc<RouteEntry>>,
}

impl OwnerEntry {
    fn is_alive(&self) -> bool {
        self.liveness.strong_count() > 0
    }
}

/// Registry of handler owners and their routes.
#[derive(Default)]
pub struct RouteTable {
    owners: RwLock<Vec<OwnerEntry>>,
}

impl RouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `owner` with its routes.
    ///
    /// Returns the owner's id, usable with [`unregister`](Self::unregister).
    pub fn register<O>(
        &self,
        owner: &Arc<O>,
        routes: impl IntoIterator<Item = Route<O>>,
    ) -> RegisterResult<OwnerId>
    where
        O: Send + Sync + 'static,
    {
        self.register_weak(Arc::downgrade(owner), routes)
    }

    /// Registers an owner given by weak reference.
    ///
    /// Fails with [`RegisterError::NilOwner`] if `owner` no longer points to
    /// a live object. Every route is validated before the table is touched;
    /// on error nothing is registered.
    pub fn register_weak<O>(
        &self,
        owner: Weak<O>,
        routes: impl IntoIterator<Item = Route<O>>,
    ) -> RegisterResult<OwnerId>
    where
        O: Send + Sync + 'static,
    {
        if owner.strong_count() == 0 {
            return Err(RegisterError::NilOwner);
        }

        let id = OwnerId::of(&owner);
        let owner_type = type_name::<O>();

        let mut entries = Vec::new();
        for route in routes {
            let pattern = route.validate()?;
            let handler = (route.bind_owner)(owner.clone());
            entries.push(Arc::new(RouteEntry {
                descriptor: HandlerDescriptor {
                    owner: id,
                    owner_type,
                    name: route.name,
                    pattern,
                    param_specs: route.params,
                    reply_kind: route.reply_kind,
                },
                handler,
            }));
        }

        let mut owners = self.owners.write();

        if owners.iter().any(|e| e.id == id) {
            return Err(RegisterError::DuplicateOwner { owner: owner_type });
        }

        owners.retain(|e| {
            let alive = e.is_alive();
            if !alive {
                debug!(owner = e.type_name, id = %e.id, "Pruned dropped owner");
            }
            alive
        });

        let route_count = entries.len();
        let liveness: Weak<dyn Any + Send + Sync> = owner;
        owners.push(OwnerEntry {
            id,
            type_name: owner_type,
            liveness,
            routes: entries,
        });

        info!(owner = owner_type, id = %id, route_count, "Handler owner registered");
        Ok(id)
    }

    /// Removes an owner and all its routes.
    ///
    /// Returns `false` if the owner was not registered.
    pub fn unregister(&self, id: OwnerId) -> bool {
        let mut owners = self.owners.write();
        match owners.iter().position(|e| e.id == id) {
            Some(pos) => {
                let removed = owners.remove(pos);
                info!(owner = removed.type_name, id = %id, "Handler owner unregistered");
                true
            }
            None => false,
        }
    }

    /// Returns `true` if an owner with this id is registered.
    pub fn contains(&self, id: OwnerId) -> bool {
        self.owners.read().iter().any(|e| e.id == id)
    }

    /// Returns the number of registered owners.
    pub fn owner_count(&self) -> usize {
        self.owners.read().len()
    }

    /// Returns the number of registered routes across all owners.
    pub fn route_count(&self) -> usize {
        self.owners.read().iter().map(|e| e.routes.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.read().is_empty()
    }

    /// Finds every route whose pattern matches `message`.
    ///
    /// Results follow registration order: owners first, then routes within
    /// an owner. Routes of dropped owners are skipped. An empty result is not
    /// an error.
    pub fn find_matches(&self, message: &str) -> Vec<Arc<RouteEntry>> {
        let owners = self.owners.read();
        let matches: Vec<_> = owners
            .iter()
            .filter(|e| e.is_alive())
            .flat_map(|e| e.routes.iter())
            .filter(|r| r.descriptor.pattern.is_match(message))
            .map(Arc::clone)
            .collect();

        trace!(message, match_count = matches.len(), "Resolved routes");
        matches
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("owner_count", &self.owner_count())
            .field("route_count", &self.route_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerOutput;
    use tokio_test::{assert_err, assert_ok};

    #[derive(Default)]
    struct Greeter;

    impl Greeter {
        async fn ping(self: Arc<Self>) -> &'static str {
            "pong"
        }

        async fn hello(self: Arc<Self>, name: String) -> String {
            format!("hello {name}")
        }

        async fn add(self: Arc<Self>, a: i32, b: i32) -> String {
            (a + b).to_string()
        }
    }

    fn names(entries: &[Arc<RouteEntry>]) -> Vec<&str> {
        entries.iter().map(|e| e.descriptor().name()).collect()
    }

    #[test]
    fn test_find_matches_full_string() {
        let table = RouteTable::new();
        let greeter = Arc::new(Greeter);
        assert_ok!(table.register(
            &greeter,
            [Route::new("hello", Greeter::ping).name("exact")]
        ));

        assert_eq!(names(&table.find_matches("hello")), vec!["exact"]);
        assert!(table.find_matches("hello world").is_empty());
    }

    #[test]
    fn test_empty_pattern_matches_everything() {
        let table = RouteTable::new();
        let greeter = Arc::new(Greeter);
        assert_ok!(table.register(&greeter, [Route::new("", Greeter::ping).name("all")]));

        for message in ["a", "hello world", "  spaced  "] {
            assert_eq!(names(&table.find_matches(message)), vec!["all"]);
        }
    }

    #[test]
    fn test_registration_order_and_duplicates() {
        let table = RouteTable::new();
        let first = Arc::new(Greeter);
        let second = Arc::new(Greeter);

        assert_ok!(table.register(
            &first,
            [
                Route::new("", Greeter::ping).name("a"),
                Route::new("x", Greeter::ping).name("b"),
                Route::new("", Greeter::ping).name("a"),
            ]
        ));
        assert_ok!(table.register(&second, [Route::new("x|y", Greeter::ping).name("c")]));

        assert_eq!(names(&table.find_matches("x")), vec!["a", "b", "a", "c"]);
        assert_eq!(names(&table.find_matches("y")), vec!["a", "a", "c"]);
        assert_eq!(table.owner_count(), 2);
        assert_eq!(table.route_count(), 4);
    }

    #[test]
    fn test_duplicate_owner_leaves_table_unchanged() {
        let table = RouteTable::new();
        let greeter = Arc::new(Greeter);
        assert_ok!(table.register(&greeter, [Route::new("ping", Greeter::ping)]));

        let err = assert_err!(table.register(
            &Arc::clone(&greeter),
            [Route::new("", Greeter::ping), Route::new("more", Greeter::ping)]
        ));
        assert!(matches!(err, RegisterError::DuplicateOwner { .. }));
        assert_eq!(table.owner_count(), 1);
        assert_eq!(table.route_count(), 1);
        assert!(table.find_matches("more").is_empty());
    }

    #[test]
    fn test_nil_owner() {
        let table = RouteTable::new();
        let err = assert_err!(table.register_weak(Weak::<Greeter>::new(), [
            Route::new("", Greeter::ping)
        ]));
        assert!(matches!(err, RegisterError::NilOwner));
        assert!(table.is_empty());
    }

    #[test]
    fn test_param_validation() {
        let table = RouteTable::new();
        let greeter = Arc::new(Greeter);

        let err = assert_err!(table.register(&greeter, [Route::new("add", Greeter::add)
            .param(ParamSpec::TokenIndexAsInt(1))]));
        assert!(matches!(
            err,
            RegisterError::ArityMismatch {
                expected: 2,
                declared: 1,
                ..
            }
        ));

        let err = assert_err!(table.register(&greeter, [Route::new("add", Greeter::add)
            .params([ParamSpec::TokenIndexAsInt(1), ParamSpec::TokenIndex(2)])]));
        assert!(matches!(
            err,
            RegisterError::ParamMismatch {
                position: 1,
                expected: ValueKind::Int,
                got: ValueKind::Text,
                ..
            }
        ));

        let err = assert_err!(table.register(&greeter, [Route::new("(", Greeter::ping)]));
        assert!(matches!(err, RegisterError::InvalidPattern { .. }));

        // A valid route after an invalid one must not be registered either.
        let err = assert_err!(table.register(&greeter, [
            Route::new("ok", Greeter::ping),
            Route::new("hello", Greeter::hello),
        ]));
        assert!(matches!(err, RegisterError::ArityMismatch { .. }));
        assert!(table.is_empty());
    }

    #[test]
    fn test_unregister() {
        let table = RouteTable::new();
        let greeter = Arc::new(Greeter);
        let id = assert_ok!(table.register(&greeter, [Route::new("", Greeter::ping)]));

        assert!(table.contains(id));
        assert!(table.unregister(id));
        assert!(!table.unregister(id));
        assert!(table.find_matches("anything").is_empty());

        // Re-registering after removal is allowed.
        assert_ok!(table.register(&greeter, [Route::new("", Greeter::ping)]));
    }

    #[tokio::test]
    async fn test_entry_calls_handler() {
        let table = RouteTable::new();
        let greeter = Arc::new(Greeter);
        assert_ok!(table.register(&greeter, [Route::new("ping", Greeter::ping)]));

        let entry = &table.find_matches("ping")[0];
        let out = (entry.handler())(BoundArgs::default()).await.unwrap();
        assert_eq!(out, HandlerOutput::Text("pong".into()));
    }

    #[tokio::test]
    async fn test_owner_dropped_in_flight() {
        let table = RouteTable::new();
        let greeter = Arc::new(Greeter);
        assert_ok!(table.register(&greeter, [Route::new("ping", Greeter::ping)]));

        let entry = table.find_matches("ping").remove(0);
        drop(greeter);

        let err = (entry.handler())(BoundArgs::default()).await.unwrap_err();
        assert!(matches!(err, InvocationError::OwnerDropped));
    }

    #[test]
    fn test_dropped_owners_stop_matching_and_are_pruned() {
        let table = RouteTable::new();
        for _ in 0..3 {
            let greeter = Arc::new(Greeter);
            assert_ok!(table.register(&greeter, [Route::new("", Greeter::ping).name("gone")]));
        }
        assert!(table.find_matches("hi").is_empty());

        let live = Arc::new(Greeter);
        assert_ok!(table.register(&live, [Route::new("", Greeter::ping).name("live")]));

        assert_eq!(names(&table.find_matches("hi")), vec!["live"]);
        assert_eq!(table.owner_count(), 1);
        assert_eq!(table.route_count(), 1);
    }
}
