use serde_json::{Map, Value};
use thiserror::Error;

/// The only inbound message kind the bridge understands.
pub const PIXEL_UPDATE: &str = "pixel_update";

/// Coarse classification used for replies, logs and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameErrorKind {
    Decode,
    Envelope,
    Shape,
}

impl FrameErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FrameErrorKind::Decode => "decode",
            FrameErrorKind::Envelope => "envelope",
            FrameErrorKind::Shape => "shape",
        }
    }
}

/// Reasons an inbound frame is rejected before it reaches the validator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("Failed to parse message data: {0}")]
    Decode(String),
    #[error("Invalid message format: not an object")]
    NotAnObject,
    /// Carries the received type for logs; the reply text omits it.
    #[error("Invalid message type")]
    UnknownType(String),
    #[error("Invalid message format: missing data")]
    MissingData,
    #[error("Invalid pixels array")]
    InvalidPixels,
    #[error("Invalid canvas dimensions")]
    InvalidDimensions,
}

impl FrameError {
    pub fn kind(&self) -> FrameErrorKind {
        match self {
            FrameError::Decode(_) => FrameErrorKind::Decode,
            FrameError::NotAnObject | FrameError::UnknownType(_) | FrameError::MissingData => {
                FrameErrorKind::Envelope
            }
            FrameError::InvalidPixels | FrameError::InvalidDimensions => FrameErrorKind::Shape,
        }
    }
}

/// Parses a frame payload and unwraps the `{type, data}` envelope, returning
/// the `data` value as the update candidate.
pub fn decode_envelope(text: &str) -> Result<Value, FrameError> {
    let message: Value =
        serde_json::from_str(text).map_err(|err| FrameError::Decode(err.to_string()))?;
    let Value::Object(mut envelope) = message else {
        return Err(FrameError::NotAnObject);
    };

    match envelope.get("type") {
        Some(Value::String(kind)) if kind == PIXEL_UPDATE => {}
        Some(other) => return Err(FrameError::UnknownType(describe(other))),
        None => return Err(FrameError::UnknownType("missing".into())),
    }

    match envelope.remove("data") {
        Some(data) if !is_falsy(&data) => Ok(data),
        _ => Err(FrameError::MissingData),
    }
}

/// Cheap structural check on the candidate: `pixels` must be an array and
/// both dimensions must be numbers. The validator applies the full rules.
pub fn check_shape(candidate: &Value) -> Result<(), FrameError> {
    let empty = Map::new();
    let fields = candidate.as_object().unwrap_or(&empty);
    if !fields.get("pixels").is_some_and(Value::is_array) {
        return Err(FrameError::InvalidPixels);
    }
    let numeric = |name: &str| fields.get(name).is_some_and(Value::is_number);
    if !numeric("width") || !numeric("height") {
        return Err(FrameError::InvalidDimensions);
    }
    Ok(())
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Mirrors the editor protocol's notion of an "empty" field.
pub(crate) fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test_timeout::timeout]
    fn unwraps_pixel_update_data() {
        let data = decode_envelope(
            r#"{"type":"pixel_update","data":{"pixels":[],"width":4,"height":4}}"#,
        )
        .unwrap();
        assert_eq!(data, json!({"pixels": [], "width": 4, "height": 4}));
    }

    #[test_timeout::timeout]
    fn rejects_unparsable_text() {
        let err = decode_envelope("{\"type\": ").unwrap_err();
        assert_eq!(err.kind(), FrameErrorKind::Decode);
        assert!(err.to_string().starts_with("Failed to parse message data: "));
    }

    #[test_timeout::timeout]
    fn rejects_scalars_and_arrays() {
        assert_eq!(decode_envelope("42"), Err(FrameError::NotAnObject));
        assert_eq!(decode_envelope("null"), Err(FrameError::NotAnObject));
        assert_eq!(decode_envelope("[1,2]"), Err(FrameError::NotAnObject));
    }

    #[test_timeout::timeout]
    fn rejects_other_message_kinds() {
        let err = decode_envelope(r#"{"type":"info","data":"hello"}"#).unwrap_err();
        assert_eq!(err, FrameError::UnknownType("info".into()));
        assert_eq!(err.kind(), FrameErrorKind::Envelope);
        assert_eq!(err.to_string(), "Invalid message type");

        let err = decode_envelope(r#"{"data":{}}"#).unwrap_err();
        assert_eq!(err, FrameError::UnknownType("missing".into()));
        assert_eq!(err.to_string(), "Invalid message type");
    }

    #[test_timeout::timeout]
    fn rejects_missing_or_empty_data() {
        for text in [
            r#"{"type":"pixel_update"}"#,
            r#"{"type":"pixel_update","data":null}"#,
            r#"{"type":"pixel_update","data":0}"#,
            r#"{"type":"pixel_update","data":""}"#,
        ] {
            assert_eq!(decode_envelope(text), Err(FrameError::MissingData), "{text}");
        }
    }

    #[test_timeout::timeout]
    fn shape_check_requires_pixel_array() {
        assert_eq!(
            check_shape(&json!({"pixels": "nope", "width": 1, "height": 1})),
            Err(FrameError::InvalidPixels)
        );
        assert_eq!(
            check_shape(&json!({"width": 1, "height": 1})),
            Err(FrameError::InvalidPixels)
        );
        assert_eq!(check_shape(&json!("text")), Err(FrameError::InvalidPixels));
    }

    #[test_timeout::timeout]
    fn shape_check_requires_numeric_dimensions() {
        let err = check_shape(&json!({"pixels": [], "width": "32", "height": 32})).unwrap_err();
        assert_eq!(err, FrameError::InvalidDimensions);
        assert_eq!(err.kind(), FrameErrorKind::Shape);
        assert!(check_shape(&json!({"pixels": [], "width": 32, "height": 32})).is_ok());
    }
}
