//! Error types for the IMR framework.
//!
//! Registration errors are returned to the caller of
//! [`RouteTable::register`](crate::RouteTable::register). Everything else is
//! per-invocation: it aborts one handler call, gets logged, and never reaches
//! the caller of `receive` or any sibling invocation.

use thiserror::Error;
use tower::BoxError;

use crate::descriptor::{ParamSpec, ValueKind};
use imr_core::SendError;

// =============================================================================
// Registration
// =============================================================================

/// Errors raised while registering a handler owner.
///
/// A failed registration never leaves a partial entry behind.
#[derive(Debug, Clone, Error)]
pub enum RegisterError {
    /// The owner reference was absent (a dangling weak reference).
    #[error("handler owner is absent")]
    NilOwner,

    /// The same owner (by identity) is already registered.
    #[error("handler owner '{owner}' is already registered")]
    DuplicateOwner {
        /// Type name of the owner.
        owner: &'static str,
    },

    /// A route pattern is not a valid regular expression.
    #[error("invalid route pattern '{pattern}' for handler '{handler}': {reason}")]
    InvalidPattern {
        /// Handler name.
        handler: String,
        /// The offending pattern.
        pattern: String,
        /// Compiler message.
        reason: String,
    },

    /// The declared parameter list has a different length than the handler.
    #[error("handler '{handler}' takes {expected} parameter(s) but {declared} were declared")]
    ArityMismatch {
        /// Handler name.
        handler: String,
        /// Parameters the handler takes (excluding the owner).
        expected: usize,
        /// Parameter specs declared on the route.
        declared: usize,
    },

    /// A declared parameter cannot produce the handler's parameter type.
    #[error(
        "parameter {position} of handler '{handler}' expects {expected:?} but {spec:?} binds {got:?}"
    )]
    ParamMismatch {
        /// Handler name.
        handler: String,
        /// Zero-based parameter position.
        position: usize,
        /// The declared spec.
        spec: ParamSpec,
        /// Kind the handler parameter accepts.
        expected: ValueKind,
        /// Kind the spec produces.
        got: ValueKind,
    },
}

// =============================================================================
// Binding
// =============================================================================

/// Errors raised while binding a handler's parameters for one order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    /// A token index is past the end of the tokenized message.
    #[error("token index {index} out of range ({len} token(s))")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of tokens in the message.
        len: usize,
    },

    /// A token could not be parsed as a signed integer.
    #[error("token {index} ('{token}') is not a number")]
    NotANumber {
        /// Token index.
        index: usize,
        /// The token text.
        token: String,
    },

    /// A handler asked for the sender handle but none is configured.
    #[error("no sender configured")]
    NoSenderConfigured,
}

// =============================================================================
// Result synthesis
// =============================================================================

/// Errors raised while turning a handler's output into a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResultError {
    /// The handler produced no value.
    #[error("handler returned no result")]
    NilResult,

    /// The handler produced a value that cannot become a reply.
    #[error("unsupported handler result type: {type_name}")]
    UnsupportedResultType {
        /// Description of the value's type.
        type_name: &'static str,
    },
}

// =============================================================================
// Invocation
// =============================================================================

/// A failed handler invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// The owner was dropped after registration, so the handler cannot be called.
    #[error("handler owner has been dropped")]
    OwnerDropped,

    /// Parameter binding failed.
    #[error(transparent)]
    Binding(#[from] BindingError),

    /// A bound value did not convert into the handler's parameter type.
    #[error("bound value at position {position} does not fit the handler parameter")]
    ArgumentMismatch {
        /// Zero-based parameter position.
        position: usize,
    },

    /// The handler itself failed.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),

    /// The handler's output could not become a reply.
    #[error(transparent)]
    Result(#[from] ResultError),

    /// The sender failed to deliver the reply.
    #[error("failed to send reply: {0}")]
    Send(#[from] SendError),
}

/// Returned by the authorization filter when an invocation is denied.
///
/// The dispatcher recognises this error and skips the invocation quietly.
#[derive(Debug, Clone, Error)]
#[error("invocation denied by authorizer")]
pub struct Unauthorized;

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for registration.
pub type RegisterResult<T> = Result<T, RegisterError>;

/// Result type for parameter binding.
pub type BindResult<T> = Result<T, BindingError>;

/// Result type for a handler invocation.
pub type InvocationResult<T> = Result<T, InvocationError>;
