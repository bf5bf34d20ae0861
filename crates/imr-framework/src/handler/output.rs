//! Handler return values.
//!
//! Whatever a handler returns is first normalized into a [`HandlerOutput`];
//! the [reply synthesizer](crate::synth) then decides whether it becomes a
//! reply.

use serde_json::Value;
use tower::BoxError;

use imr_core::Reply;

/// The normalized result of one handler call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutput {
    /// The handler produced no value.
    Nothing,
    /// Text to be wrapped according to the route's reply kind.
    Text(String),
    /// A fully built reply, sent unchanged.
    Reply(Reply),
    /// A value that cannot become a reply.
    Unsupported { type_name: &'static str },
}

/// Types that can be returned from handlers.
///
/// | return type          | output                                        |
/// |----------------------|-----------------------------------------------|
/// | `()`                 | [`HandlerOutput::Nothing`]                    |
/// | `String`, `&'static str` | [`HandlerOutput::Text`]                   |
/// | [`Reply`]            | [`HandlerOutput::Reply`]                      |
/// | `Option<T>`          | `None` is nothing, `Some` defers to `T`       |
/// | `Result<T, E>`       | `Err` fails the invocation                    |
/// | [`serde_json::Value`] | strings are text, `null` is nothing, anything else is unsupported |
pub trait IntoHandlerOutput: Send + 'static {
    /// Converts this value, or returns the handler's own error.
    fn into_handler_output(self) -> Result<HandlerOutput, BoxError>;
}

impl IntoHandlerOutput for () {
    fn into_handler_output(self) -> Result<HandlerOutput, BoxError> {
        Ok(HandlerOutput::Nothing)
    }
}

impl IntoHandlerOutput for String {
    fn into_handler_output(self) -> Result<HandlerOutput, BoxError> {
        Ok(HandlerOutput::Text(self))
    }
}

impl IntoHandlerOutput for &'static str {
    fn into_handler_output(self) -> Result<HandlerOutput, BoxError> {
        Ok(HandlerOutput::Text(self.to_string()))
    }
}

impl IntoHandlerOutput for Reply {
    fn into_handler_output(self) -> Result<HandlerOutput, BoxError> {
        Ok(HandlerOutput::Reply(self))
    }
}

impl IntoHandlerOutput for HandlerOutput {
    fn into_handler_output(self) -> Result<HandlerOutput, BoxError> {
        Ok(self)
    }
}

impl<T: IntoHandlerOutput> IntoHandlerOutput for Option<T> {
    fn into_handler_output(self) -> Result<HandlerOutput, BoxError> {
        match self {
            Some(t) => t.into_handler_output(),
            None => Ok(HandlerOutput::Nothing),
        }
    }
}

impl<T, E> IntoHandlerOutput for Result<T, E>
where
    T: IntoHandlerOutput,
    E: Into<BoxError> + Send + 'static,
{
    fn into_handler_output(self) -> Result<HandlerOutput, BoxError> {
        match self {
            Ok(t) => t.into_handler_output(),
            Err(e) => Err(e.into()),
        }
    }
}

impl IntoHandlerOutput for Value {
    fn into_handler_output(self) -> Result<HandlerOutput, BoxError> {
        let output = match self {
            Value::Null => HandlerOutput::Nothing,
            Value::String(s) => HandlerOutput::Text(s),
            Value::Bool(_) => HandlerOutput::Unsupported {
                type_name: "json bool",
            },
            Value::Number(_) => HandlerOutput::Unsupported {
                type_name: "json number",
            },
            Value::Array(_) => HandlerOutput::Unsupported {
                type_name: "json array",
            },
            Value::Object(_) => HandlerOutput::Unsupported {
                type_name: "json object",
            },
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_outputs() {
        assert_eq!(
            "pong".into_handler_output().unwrap(),
            HandlerOutput::Text("pong".into())
        );
        assert_eq!(
            Some("pong".to_string()).into_handler_output().unwrap(),
            HandlerOutput::Text("pong".into())
        );
        assert_eq!(
            None::<String>.into_handler_output().unwrap(),
            HandlerOutput::Nothing
        );
    }

    #[test]
    fn test_result_error_propagates() {
        let res: Result<String, String> = Err("boom".into());
        let err = res.into_handler_output().unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_json_outputs() {
        assert_eq!(
            json!("hi").into_handler_output().unwrap(),
            HandlerOutput::Text("hi".into())
        );
        assert_eq!(
            json!(null).into_handler_output().unwrap(),
            HandlerOutput::Nothing
        );
        assert_eq!(
            json!([1, 2]).into_handler_output().unwrap(),
            HandlerOutput::Unsupported {
                type_name: "json array"
            }
        );
    }
}
