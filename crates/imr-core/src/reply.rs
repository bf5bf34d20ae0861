//! Outbound replies and the [`Sender`] that delivers them.
//!
//! A [`Reply`] is built once per handler invocation and moved straight into
//! the sender; nothing mutates it afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SendResult;

/// An outbound message addressed to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reply {
    /// A plain text reply.
    Plain {
        /// The text to send.
        content: String,
        /// The group to send it to.
        target_group: i64,
    },
    /// A rich service reply, rendered by the platform from `content`.
    Service {
        /// The service payload (usually XML).
        content: String,
        /// The group to send it to.
        target_group: i64,
        /// Platform service identifier.
        service_id: i32,
    },
}

impl Reply {
    /// Creates a plain text reply.
    pub fn plain(content: impl Into<String>, target_group: i64) -> Self {
        Self::Plain {
            content: content.into(),
            target_group,
        }
    }

    /// Creates a service reply.
    pub fn service(content: impl Into<String>, target_group: i64, service_id: i32) -> Self {
        Self::Service {
            content: content.into(),
            target_group,
            service_id,
        }
    }

    /// Returns the reply body.
    pub fn content(&self) -> &str {
        match self {
            Self::Plain { content, .. } | Self::Service { content, .. } => content,
        }
    }

    /// Returns the group this reply is addressed to.
    pub fn target_group(&self) -> i64 {
        match self {
            Self::Plain { target_group, .. } | Self::Service { target_group, .. } => *target_group,
        }
    }

    /// Returns the service id for service replies.
    pub fn service_id(&self) -> Option<i32> {
        match self {
            Self::Plain { .. } => None,
            Self::Service { service_id, .. } => Some(*service_id),
        }
    }
}

/// Delivers replies to the messaging platform.
///
/// Implementations must be safe to call concurrently: every matched handler
/// runs in its own task and sends without further synchronization.
///
/// # Example
///
/// ```rust,ignore
/// struct StdoutSender;
///
/// #[async_trait]
/// impl Sender for StdoutSender {
///     async fn send(&self, reply: Reply) -> SendResult<()> {
///         println!("[{}] {}", reply.target_group(), reply.content());
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Sender: Send + Sync + 'static {
    /// Sends one reply.
    async fn send(&self, reply: Reply) -> SendResult<()>;
}

/// A shared, type-erased sender.
pub type BoxedSender = Arc<dyn Sender>;
