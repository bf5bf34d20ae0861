//! Invocation authorization.
//!
//! An [`Authorizer`] runs after a route has matched and before its
//! parameters are bound. Denied invocations are skipped without a reply.
//!
//! Any `Fn(&HandlerDescriptor, &Order) -> bool` closure is an authorizer:
//!
//! ```rust,ignore
//! let admins_only = |d: &HandlerDescriptor, o: &Order| {
//!     !d.name().starts_with("admin_") || ADMINS.contains(&o.sender_id())
//! };
//! ```

use crate::descriptor::HandlerDescriptor;
use imr_core::Order;

/// Decides whether a matched handler may run for an order.
pub trait Authorizer: Send + Sync + 'static {
    fn authorize(&self, descriptor: &HandlerDescriptor, order: &Order) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&HandlerDescriptor, &Order) -> bool + Send + Sync + 'static,
{
    fn authorize(&self, descriptor: &HandlerDescriptor, order: &Order) -> bool {
        self(descriptor, order)
    }
}

/// Allows every invocation. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn authorize(&self, _descriptor: &HandlerDescriptor, _order: &Order) -> bool {
        true
    }
}
