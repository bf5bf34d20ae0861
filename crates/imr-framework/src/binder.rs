//! Parameter binding.
//!
//! The binder turns a handler's declared [`ParamSpec`]s into concrete
//! [`BoundValue`]s for one order. It runs only for handlers whose route
//! matched, right before the handler is called.
//!
//! Handler parameters receive bound values through [`FromBound`], which
//! also reports the [`ValueKind`] each parameter type accepts so that
//! mismatches are caught at registration instead of at call time.

use std::fmt;
use std::sync::Arc;

use crate::descriptor::{ParamSpec, ValueKind};
use crate::error::{BindResult, BindingError};
use imr_core::{BoxedSender, Order};

// ============================================================================
// AtMentions
// ============================================================================

/// Accounts mentioned ("at"-ed) in a message.
///
/// Mention parsing is platform specific and not implemented; binding
/// [`ParamSpec::AtMentions`] always yields an empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AtMentions(Vec<i64>);

impl AtMentions {
    /// Returns `true` when nobody was mentioned.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.0.iter().copied()
    }
}

// ============================================================================
// BoundValue
// ============================================================================

/// One bound handler argument.
#[derive(Clone)]
pub enum BoundValue {
    Text(String),
    Int(i32),
    Long(i64),
    Order(Arc<Order>),
    Mentions(AtMentions),
    Sender(BoxedSender),
}

impl BoundValue {
    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Int(_) => ValueKind::Int,
            Self::Long(_) => ValueKind::Long,
            Self::Order(_) => ValueKind::Order,
            Self::Mentions(_) => ValueKind::Mentions,
            Self::Sender(_) => ValueKind::Sender,
        }
    }
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::Long(n) => f.debug_tuple("Long").field(n).finish(),
            Self::Order(o) => f.debug_tuple("Order").field(o).finish(),
            Self::Mentions(m) => f.debug_tuple("Mentions").field(m).finish(),
            Self::Sender(_) => f.write_str("Sender(..)"),
        }
    }
}

/// Senders compare by identity.
impl PartialEq for BoundValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Order(a), Self::Order(b)) => a == b,
            (Self::Mentions(a), Self::Mentions(b)) => a == b,
            (Self::Sender(a), Self::Sender(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// The bound arguments for one invocation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs(Vec<BoundValue>);

impl BoundArgs {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&BoundValue> {
        self.0.get(index)
    }

    pub fn as_slice(&self) -> &[BoundValue] {
        &self.0
    }
}

impl IntoIterator for BoundArgs {
    type Item = BoundValue;
    type IntoIter = std::vec::IntoIter<BoundValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl From<Vec<BoundValue>> for BoundArgs {
    fn from(values: Vec<BoundValue>) -> Self {
        Self(values)
    }
}

// ============================================================================
// Binding
// ============================================================================

/// Splits a message into tokens on runs of whitespace.
///
/// Never yields empty tokens, so leading, trailing and repeated whitespace
/// do not shift token indices.
pub fn tokenize(message: &str) -> Vec<&str> {
    message.split_whitespace().collect()
}

/// Binds `specs` against `order`.
///
/// `sender` is only consulted for [`ParamSpec::ReplySenderHandle`].
pub fn bind(
    specs: &[ParamSpec],
    order: &Arc<Order>,
    sender: Option<&BoxedSender>,
) -> BindResult<BoundArgs> {
    let tokens = tokenize(order.message());

    specs
        .iter()
        .map(|spec| bind_one(*spec, &tokens, order, sender))
        .collect::<BindResult<Vec<_>>>()
        .map(BoundArgs)
}

fn bind_one(
    spec: ParamSpec,
    tokens: &[&str],
    order: &Arc<Order>,
    sender: Option<&BoxedSender>,
) -> BindResult<BoundValue> {
    let value = match spec {
        ParamSpec::TokenIndex(i) => BoundValue::Text(token(tokens, i)?.to_string()),
        ParamSpec::TokenIndexAsInt(i) => BoundValue::Int(parse_token(tokens, i)?),
        ParamSpec::TokenIndexAsLong(i) => BoundValue::Long(parse_token(tokens, i)?),
        ParamSpec::FullMessage => BoundValue::Text(order.message().to_string()),
        ParamSpec::RawOrder => BoundValue::Order(Arc::clone(order)),
        ParamSpec::GroupId => BoundValue::Long(order.group_id()),
        ParamSpec::SenderId => BoundValue::Long(order.sender_id()),
        ParamSpec::SenderNick => BoundValue::Text(order.sender_nick().to_string()),
        ParamSpec::AtMentions => BoundValue::Mentions(AtMentions::default()),
        ParamSpec::ReplySenderHandle => {
            let sender = sender.ok_or(BindingError::NoSenderConfigured)?;
            BoundValue::Sender(Arc::clone(sender))
        }
    };
    Ok(value)
}

fn token<'a>(tokens: &[&'a str], index: usize) -> BindResult<&'a str> {
    tokens
        .get(index)
        .copied()
        .ok_or(BindingError::IndexOutOfRange {
            index,
            len: tokens.len(),
        })
}

fn parse_token<T: std::str::FromStr>(tokens: &[&str], index: usize) -> BindResult<T> {
    let raw = token(tokens, index)?;
    raw.parse().map_err(|_| BindingError::NotANumber {
        index,
        token: raw.to_string(),
    })
}

// ============================================================================
// FromBound
// ============================================================================

/// Types a handler parameter can be.
///
/// `KIND` is checked against the declared [`ParamSpec`] at registration;
/// `from_bound` returns `None` only if that check was bypassed.
pub trait FromBound: Sized {
    /// The kind of bound value this type accepts.
    const KIND: ValueKind;

    /// Converts a bound value into this type.
    fn from_bound(value: BoundValue) -> Option<Self>;
}

macro_rules! impl_from_bound {
    ($ty:ty, $kind:ident) => {
        impl FromBound for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn from_bound(value: BoundValue) -> Option<Self> {
                match value {
                    BoundValue::$kind(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_from_bound!(String, Text);
impl_from_bound!(i32, Int);
impl_from_bound!(i64, Long);
impl_from_bound!(Arc<Order>, Order);
impl_from_bound!(AtMentions, Mentions);
impl_from_bound!(BoxedSender, Sender);

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use imr_core::{Reply, SendResult, Sender};
    use tokio_test::assert_ok;

    struct NullSender;

    #[async_trait]
    impl Sender for NullSender {
        async fn send(&self, _reply: Reply) -> SendResult<()> {
            Ok(())
        }
    }

    fn order(message: &str) -> Arc<Order> {
        Arc::new(Order::new(message, 42, 7, "alice").unwrap())
    }

    #[test]
    fn test_tokenize_collapses_whitespace() {
        assert_eq!(tokenize("  foo \t bar\n baz  "), vec!["foo", "bar", "baz"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_positional_binding() {
        let args = assert_ok!(bind(
            &[ParamSpec::TokenIndex(0), ParamSpec::TokenIndex(1)],
            &order("foo bar"),
            None,
        ));
        assert_eq!(
            args.as_slice(),
            &[
                BoundValue::Text("foo".into()),
                BoundValue::Text("bar".into())
            ]
        );
    }

    #[test]
    fn test_numeric_tokens() {
        let args = assert_ok!(bind(
            &[
                ParamSpec::TokenIndexAsInt(1),
                ParamSpec::TokenIndexAsLong(2)
            ],
            &order("add -3 9000000000"),
            None,
        ));
        assert_eq!(
            args.as_slice(),
            &[BoundValue::Int(-3), BoundValue::Long(9_000_000_000)]
        );
    }

    #[test]
    fn test_not_a_number() {
        let err = bind(&[ParamSpec::TokenIndexAsInt(1)], &order("add x"), None).unwrap_err();
        assert_eq!(
            err,
            BindingError::NotANumber {
                index: 1,
                token: "x".into()
            }
        );

        // Overflowing an i32 is also not a number for an Int parameter.
        let err = bind(
            &[ParamSpec::TokenIndexAsInt(0)],
            &order("9000000000"),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, BindingError::NotANumber { index: 0, .. }));
    }

    #[test]
    fn test_index_out_of_range() {
        let err = bind(&[ParamSpec::TokenIndexAsInt(3)], &order("add 1"), None).unwrap_err();
        assert_eq!(err, BindingError::IndexOutOfRange { index: 3, len: 2 });

        let err = bind(&[ParamSpec::TokenIndex(2)], &order("add 1"), None).unwrap_err();
        assert_eq!(err, BindingError::IndexOutOfRange { index: 2, len: 2 });
    }

    #[test]
    fn test_order_fields() {
        let order = order("hello there");
        let args = assert_ok!(bind(
            &[
                ParamSpec::FullMessage,
                ParamSpec::RawOrder,
                ParamSpec::GroupId,
                ParamSpec::SenderId,
                ParamSpec::SenderNick,
                ParamSpec::AtMentions,
            ],
            &order,
            None,
        ));
        assert_eq!(
            args.as_slice(),
            &[
                BoundValue::Text("hello there".into()),
                BoundValue::Order(Arc::clone(&order)),
                BoundValue::Long(42),
                BoundValue::Long(7),
                BoundValue::Text("alice".into()),
                BoundValue::Mentions(AtMentions::default()),
            ]
        );
    }

    #[test]
    fn test_sender_handle() {
        let err = bind(&[ParamSpec::ReplySenderHandle], &order("hi"), None).unwrap_err();
        assert_eq!(err, BindingError::NoSenderConfigured);

        let sender: BoxedSender = Arc::new(NullSender);
        let args = assert_ok!(bind(
            &[ParamSpec::ReplySenderHandle],
            &order("hi"),
            Some(&sender)
        ));
        assert_eq!(args.as_slice(), &[BoundValue::Sender(sender)]);
    }

    #[test]
    fn test_from_bound() {
        assert_eq!(
            String::from_bound(BoundValue::Text("x".into())),
            Some("x".to_string())
        );
        assert_eq!(i64::from_bound(BoundValue::Int(1)), None);
        assert_eq!(<i32 as FromBound>::KIND, ValueKind::Int);
    }
}
