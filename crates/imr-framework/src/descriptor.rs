//! Handler metadata: route patterns, parameter roles and reply kinds.
//!
//! A [`HandlerDescriptor`] is everything the router knows about one handler
//! apart from the function itself. It is built once at registration and
//! never changes afterwards.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::route::OwnerId;

// ============================================================================
// ParamSpec
// ============================================================================

/// The role of one handler parameter.
///
/// Specs are declared in parameter order; the binder walks them positionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSpec {
    /// The raw token at this index.
    TokenIndex(usize),
    /// The token at this index parsed as an `i32`.
    TokenIndexAsInt(usize),
    /// The token at this index parsed as an `i64`.
    TokenIndexAsLong(usize),
    /// The whole message text.
    FullMessage,
    /// The order itself.
    RawOrder,
    /// The group the order arrived in.
    GroupId,
    /// The sender's account number.
    SenderId,
    /// The sender's display name.
    SenderNick,
    /// Accounts mentioned in the message. Always empty for now.
    AtMentions,
    /// A handle to the configured sender.
    ReplySenderHandle,
}

impl ParamSpec {
    /// Returns the kind of value this spec binds to.
    pub fn kind(self) -> ValueKind {
        match self {
            Self::TokenIndex(_) | Self::FullMessage | Self::SenderNick => ValueKind::Text,
            Self::TokenIndexAsInt(_) => ValueKind::Int,
            Self::TokenIndexAsLong(_) | Self::GroupId | Self::SenderId => ValueKind::Long,
            Self::RawOrder => ValueKind::Order,
            Self::AtMentions => ValueKind::Mentions,
            Self::ReplySenderHandle => ValueKind::Sender,
        }
    }
}

/// The shape of a bound value.
///
/// Used at registration to check declared specs against handler signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    Text,
    Int,
    Long,
    Order,
    Mentions,
    Sender,
}

// ============================================================================
// ReplyKind
// ============================================================================

/// How a textual handler result is wrapped into a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    /// A plain text reply.
    Words,
    /// A service reply with the given service id.
    XmlService { service_id: i32 },
}

/// Routes that do not declare a reply kind send service replies with id 1.
impl Default for ReplyKind {
    fn default() -> Self {
        Self::XmlService { service_id: 1 }
    }
}

// ============================================================================
// RoutePattern
// ============================================================================

/// A compiled route pattern.
///
/// Non-empty patterns must match the **whole** message: `"hello"` does not
/// match `"hello world"`. The empty pattern matches everything.
#[derive(Clone)]
pub struct RoutePattern {
    source: String,
    regex: Option<Regex>,
}

impl RoutePattern {
    /// Compiles `source` with full-string match semantics.
    pub fn new(source: impl Into<String>) -> Result<Self, regex::Error> {
        let source = source.into();
        let regex = if source.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("^(?:{source})$"))?)
        };
        Ok(Self { source, regex })
    }

    /// Returns `true` if `message` matches this pattern.
    pub fn is_match(&self, message: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(message),
            None => true,
        }
    }

    /// Returns the pattern as declared.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns `true` for the match-everything pattern.
    pub fn is_catch_all(&self) -> bool {
        self.regex.is_none()
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutePattern").field(&self.source).finish()
    }
}

// ============================================================================
// HandlerDescriptor
// ============================================================================

/// Registered metadata for one handler.
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    pub(crate) owner: OwnerId,
    pub(crate) owner_type: &'static str,
    pub(crate) name: String,
    pub(crate) pattern: RoutePattern,
    pub(crate) param_specs: Vec<ParamSpec>,
    pub(crate) reply_kind: ReplyKind,
}

impl HandlerDescriptor {
    /// Identity of the owning object.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Type name of the owning object.
    pub fn owner_type(&self) -> &'static str {
        self.owner_type
    }

    /// Handler name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn param_specs(&self) -> &[ParamSpec] {
        &self.param_specs
    }

    pub fn reply_kind(&self) -> ReplyKind {
        self.reply_kind
    }
}
