//! The normalized inbound message.
//!
//! An [`Order`] is what every platform event is reduced to before routing:
//! the message text, the group it arrived in, and who sent it. Orders are
//! immutable once built and are shared read-only between all handlers that
//! match them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{OrderError, OrderResult};

/// A normalized inbound chat message.
///
/// Deserialization goes through [`Order::new`], so a decoded order upholds
/// the same non-empty invariants as a constructed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OrderFields")]
pub struct Order {
    message: String,
    group_id: i64,
    sender_id: i64,
    sender_nick: String,
}

impl Order {
    /// Creates a new order.
    ///
    /// Fails when the message text or the sender nick is empty.
    pub fn new(
        message: impl Into<String>,
        group_id: i64,
        sender_id: i64,
        sender_nick: impl Into<String>,
    ) -> OrderResult<Self> {
        let message = message.into();
        let sender_nick = sender_nick.into();

        if message.is_empty() {
            return Err(OrderError::EmptyMessage);
        }
        if sender_nick.is_empty() {
            return Err(OrderError::EmptySenderNick);
        }

        Ok(Self {
            message,
            group_id,
            sender_id,
            sender_nick,
        })
    }

    /// Returns the message text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the group the message arrived in.
    pub fn group_id(&self) -> i64 {
        self.group_id
    }

    /// Returns the sender's account number.
    pub fn sender_id(&self) -> i64 {
        self.sender_id
    }

    /// Returns the sender's display name.
    pub fn sender_nick(&self) -> &str {
        &self.sender_nick
    }

    /// Returns a multi-line, human-readable description of this order.
    ///
    /// ```text
    /// OrderInfo:
    ///     GroupNumber->42
    ///     SenderNumber->7
    ///     SenderNick->alice
    ///     MessageContent->ping
    /// ```
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

#[derive(Deserialize)]
struct OrderFields {
    message: String,
    group_id: i64,
    sender_id: i64,
    sender_nick: String,
}

impl TryFrom<OrderFields> for Order {
    type Error = OrderError;

    fn try_from(fields: OrderFields) -> OrderResult<Self> {
        Self::new(
            fields.message,
            fields.group_id,
            fields.sender_id,
            fields.sender_nick,
        )
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OrderInfo:\n    GroupNumber->{}\n    SenderNumber->{}\n    SenderNick->{}\n    MessageContent->{}",
            self.group_id, self.sender_id, self.sender_nick, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_new_order() {
        let order = assert_ok!(Order::new("ping", 42, 7, "alice"));
        assert_eq!(order.message(), "ping");
        assert_eq!(order.group_id(), 42);
        assert_eq!(order.sender_id(), 7);
        assert_eq!(order.sender_nick(), "alice");
    }

    #[test]
    fn test_empty_fields_rejected() {
        assert_eq!(
            assert_err!(Order::new("", 1, 2, "alice")),
            OrderError::EmptyMessage
        );
        assert_eq!(
            assert_err!(Order::new("hi", 1, 2, "")),
            OrderError::EmptySenderNick
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let order: Order = serde_json::from_str(
            r#"{"message":"hi","group_id":1,"sender_id":2,"sender_nick":"bob"}"#,
        )
        .unwrap();
        assert_eq!(order.sender_nick(), "bob");

        let empty = serde_json::from_str::<Order>(
            r#"{"message":"","group_id":1,"sender_id":2,"sender_nick":"bob"}"#,
        );
        assert!(empty.is_err());
    }

    #[test]
    fn test_describe() {
        let order = Order::new("ping", 42, 7, "alice").unwrap();
        assert_eq!(
            order.describe(),
            "OrderInfo:\n    GroupNumber->42\n    SenderNumber->7\n    SenderNick->alice\n    MessageContent->ping"
        );
    }
}
