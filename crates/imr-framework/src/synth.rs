//! Reply synthesis.

use crate::descriptor::ReplyKind;
use crate::error::ResultError;
use crate::handler::HandlerOutput;
use imr_core::{Order, Reply};

/// Turns a handler's output into the reply to send.
///
/// Text is wrapped according to `reply_kind` and addressed to the group the
/// order came from. Prebuilt replies pass through unchanged.
pub fn synthesize(
    output: HandlerOutput,
    reply_kind: ReplyKind,
    order: &Order,
) -> Result<Reply, ResultError> {
    match output {
        HandlerOutput::Nothing => Err(ResultError::NilResult),
        HandlerOutput::Reply(reply) => Ok(reply),
        HandlerOutput::Text(text) => Ok(match reply_kind {
            ReplyKind::Words => Reply::plain(text, order.group_id()),
            ReplyKind::XmlService { service_id } => {
                Reply::service(text, order.group_id(), service_id)
            }
        }),
        HandlerOutput::Unsupported { type_name } => {
            Err(ResultError::UnsupportedResultType { type_name })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> Order {
        Order::new("anything", 42, 7, "alice").unwrap()
    }

    #[test]
    fn test_words() {
        let reply = synthesize(
            HandlerOutput::Text("pong".into()),
            ReplyKind::Words,
            &order(),
        )
        .unwrap();
        assert_eq!(reply, Reply::plain("pong", 42));
    }

    #[test]
    fn test_xml_service() {
        let reply = synthesize(
            HandlerOutput::Text("<card/>".into()),
            ReplyKind::XmlService { service_id: 7 },
            &order(),
        )
        .unwrap();
        assert_eq!(reply.content(), "<card/>");
        assert_eq!(reply.target_group(), 42);
        assert_eq!(reply.service_id(), Some(7));
    }

    #[test]
    fn test_prebuilt_reply_passes_through() {
        let prebuilt = Reply::plain("elsewhere", 1000);
        let reply = synthesize(
            HandlerOutput::Reply(prebuilt.clone()),
            ReplyKind::default(),
            &order(),
        )
        .unwrap();
        assert_eq!(reply, prebuilt);
    }

    #[test]
    fn test_no_reply() {
        assert_eq!(
            synthesize(HandlerOutput::Nothing, ReplyKind::Words, &order()),
            Err(ResultError::NilResult)
        );
        assert_eq!(
            synthesize(
                HandlerOutput::Unsupported {
                    type_name: "json number"
                },
                ReplyKind::Words,
                &order()
            ),
            Err(ResultError::UnsupportedResultType {
                type_name: "json number"
            })
        );
    }
}
