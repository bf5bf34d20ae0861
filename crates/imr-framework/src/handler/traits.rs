//! The [`Handler`] trait.
//!
//! Handlers are plain async functions whose first parameter is the owning
//! object (as `Arc<O>`) and whose remaining parameters implement
//! [`FromBound`]. The trait is implemented for such functions of up to
//! twelve bound parameters, so owners can register their methods directly:
//!
//! ```rust,ignore
//! struct Calculator;
//!
//! impl Calculator {
//!     async fn add(self: Arc<Self>, a: i32, b: i32) -> String {
//!         (a + b).to_string()
//!     }
//! }
//!
//! Route::new(r"add -?\d+ -?\d+", Calculator::add)
//!     .params([ParamSpec::TokenIndexAsInt(1), ParamSpec::TokenIndexAsInt(2)])
//!     .reply(ReplyKind::Words);
//! ```

use std::sync::Arc;

use futures::future::BoxFuture;

use super::output::{HandlerOutput, IntoHandlerOutput};
use crate::binder::{BoundArgs, FromBound};
use crate::descriptor::ValueKind;
use crate::error::{InvocationError, InvocationResult};

/// A handler owned by objects of type `O`.
///
/// `T` is a marker for the parameter tuple and only exists to keep the
/// arity implementations apart.
pub trait Handler<O, T>: Clone + Send + Sync + 'static {
    /// The kinds of the handler's bound parameters, in order.
    fn param_kinds() -> Vec<ValueKind>;

    /// Calls the handler with its owner and bound arguments.
    fn call(
        self,
        owner: Arc<O>,
        args: BoundArgs,
    ) -> BoxFuture<'static, InvocationResult<HandlerOutput>>;
}

/// Type-erased handler stored in the route table.
///
/// Holds the owner weakly; calling it after the owner is gone fails with
/// [`InvocationError::OwnerDropped`].
pub type ErasedHandler =
    Arc<dyn Fn(BoundArgs) -> BoxFuture<'static, InvocationResult<HandlerOutput>> + Send + Sync>;

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_assignments, unused_mut, unused_variables)]
        impl<O, F, Fut, Res, $($ty,)*> Handler<O, ($($ty,)*)> for F
        where
            O: Send + Sync + 'static,
            F: FnOnce(Arc<O>, $($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = Res> + Send + 'static,
            Res: IntoHandlerOutput,
            $( $ty: FromBound + Send + 'static, )*
        {
            fn param_kinds() -> Vec<ValueKind> {
                vec![$($ty::KIND,)*]
            }

            fn call(
                self,
                owner: Arc<O>,
                args: BoundArgs,
            ) -> BoxFuture<'static, InvocationResult<HandlerOutput>> {
                Box::pin(async move {
                    let mut args = args.into_iter();
                    let mut position = 0usize;
                    $(
                        let $ty = args
                            .next()
                            .and_then($ty::from_bound)
                            .ok_or(InvocationError::ArgumentMismatch { position })?;
                        position += 1;
                    )*

                    let res = (self)(owner, $($ty,)*).await;
                    res.into_handler_output().map_err(InvocationError::Handler)
                })
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);
