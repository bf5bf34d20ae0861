//! Error types shared by every IMR crate.
//!
//! Framework-level errors (registration, binding, result synthesis) are
//! defined in `imr-framework`.

use thiserror::Error;

// =============================================================================
// Order Errors
// =============================================================================

/// Errors raised when constructing an [`Order`](crate::Order).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The message text was empty.
    #[error("order message must not be empty")]
    EmptyMessage,

    /// The sender nick was empty.
    #[error("order sender nick must not be empty")]
    EmptySenderNick,
}

// =============================================================================
// Send Errors
// =============================================================================

/// Errors a [`Sender`](crate::Sender) may report for a single reply.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    /// The outbound channel is gone.
    #[error("sender is closed")]
    Closed,

    /// The target group rejected the reply.
    #[error("group {group} rejected the reply: {reason}")]
    Rejected {
        /// The target group.
        group: i64,
        /// Reason reported by the platform.
        reason: String,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl SendError {
    /// Creates a free-form send error.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for order construction.
pub type OrderResult<T> = Result<T, OrderError>;

/// Result type for reply delivery.
pub type SendResult<T> = Result<T, SendError>;
