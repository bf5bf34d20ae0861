//! Turning platform events into [`Order`]s.
//!
//! An [`OrderFactory`] is the only platform-specific piece the router needs
//! on the inbound side. It must be total: a source event that cannot be
//! represented as an order yields `None`, which the dispatcher treats as a
//! deliberate filter rather than an error.

use serde_json::Value;
use tracing::trace;

use crate::order::Order;

/// Wraps raw source events into orders.
pub trait OrderFactory: Send + Sync + 'static {
    /// The raw event type this factory accepts.
    type Source: Send + 'static;

    /// Wraps `source` into an order, or returns `None` when it is not
    /// representable (unsupported platform, non-text event, ...).
    fn wrap_source(&self, source: Self::Source) -> Option<Order>;
}

/// A factory for callers that already produce orders.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl OrderFactory for PassThrough {
    type Source = Order;

    fn wrap_source(&self, source: Order) -> Option<Order> {
        Some(source)
    }
}

/// A factory backed by a closure.
///
/// ```rust,ignore
/// let factory = FnOrderFactory::new(|line: String| Order::new(line, 0, 0, "console").ok());
/// ```
pub struct FnOrderFactory<S, F> {
    f: F,
    _marker: std::marker::PhantomData<fn(S)>,
}

impl<S, F> FnOrderFactory<S, F>
where
    F: Fn(S) -> Option<Order>,
{
    /// Wraps `f` as an order factory.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<S, F> OrderFactory for FnOrderFactory<S, F>
where
    S: Send + 'static,
    F: Fn(S) -> Option<Order> + Send + Sync + 'static,
{
    type Source = S;

    fn wrap_source(&self, source: S) -> Option<Order> {
        (self.f)(source)
    }
}

/// A factory for JSON events carrying the order fields directly.
///
/// Accepts objects shaped like
/// `{"message": "...", "group_id": 1, "sender_id": 2, "sender_nick": "..."}`.
/// Anything else (missing fields, wrong types, empty text) is filtered out.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonOrderFactory;

impl OrderFactory for JsonOrderFactory {
    type Source = Value;

    fn wrap_source(&self, source: Value) -> Option<Order> {
        match serde_json::from_value(source) {
            Ok(order) => Some(order),
            Err(e) => {
                trace!("JSON event is not an order: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pass_through() {
        let order = Order::new("hi", 1, 2, "bob").unwrap();
        assert_eq!(PassThrough.wrap_source(order.clone()), Some(order));
    }

    #[test]
    fn test_fn_factory_filters() {
        let factory = FnOrderFactory::new(|line: String| Order::new(line, 0, 0, "console").ok());
        assert!(factory.wrap_source("ping".to_string()).is_some());
        assert!(factory.wrap_source(String::new()).is_none());
    }

    #[test]
    fn test_json_factory() {
        let order = JsonOrderFactory
            .wrap_source(json!({
                "message": "ping",
                "group_id": 42,
                "sender_id": 7,
                "sender_nick": "alice"
            }))
            .unwrap();
        assert_eq!(order.group_id(), 42);

        assert!(JsonOrderFactory.wrap_source(json!({"message": "ping"})).is_none());
        assert!(JsonOrderFactory.wrap_source(json!("ping")).is_none());
    }
}
