use serde_json::Value;
use thiserror::Error;

use crate::canvas::{now_millis, CanvasUpdate, Pixel};
use crate::frame::is_falsy;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("update is not an object")]
    NotAnObject,
    #[error("update has no pixels field")]
    MissingPixels,
    #[error("update pixels field is not an array")]
    PixelsNotArray,
    #[error("update contains no pixels")]
    EmptyPixels,
    #[error("update {field} is missing or not a number")]
    DimensionNotNumeric { field: &'static str },
    #[error("update {field} must be a positive integer, got {value}")]
    InvalidDimension { field: &'static str, value: String },
    #[error("pixel {index} is malformed: {reason}")]
    MalformedPixel { index: usize, reason: String },
}

/// Checks a decoded update candidate and produces a normalized
/// [`CanvasUpdate`], stamping it with the current time when the sender did
/// not provide one.
pub fn validate_update(candidate: &Value) -> Result<CanvasUpdate, ValidationError> {
    validate_update_at(candidate, now_millis())
}

/// Same as [`validate_update`] with an explicit receive time.
///
/// Checks run in order and stop at the first failure: object shape, pixel
/// list, dimensions, then timestamp normalization. Pixel coordinates are
/// never compared against the canvas size.
pub fn validate_update_at(candidate: &Value, now: i64) -> Result<CanvasUpdate, ValidationError> {
    let fields = candidate.as_object().ok_or(ValidationError::NotAnObject)?;

    let raw_pixels = fields
        .get("pixels")
        .ok_or(ValidationError::MissingPixels)?
        .as_array()
        .ok_or(ValidationError::PixelsNotArray)?;
    if raw_pixels.is_empty() {
        return Err(ValidationError::EmptyPixels);
    }

    let width = dimension(fields.get("width"), "width")?;
    let height = dimension(fields.get("height"), "height")?;

    let timestamp = match fields.get("timestamp") {
        Some(value) if !is_falsy(value) => value
            .as_i64()
            .or_else(|| value.as_f64().map(|millis| millis as i64))
            .unwrap_or(now),
        _ => now,
    };

    let pixels = raw_pixels
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            serde_json::from_value::<Pixel>(raw.clone()).map_err(|err| {
                ValidationError::MalformedPixel {
                    index,
                    reason: err.to_string(),
                }
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CanvasUpdate {
        pixels,
        timestamp,
        width,
        height,
    })
}

fn dimension(value: Option<&Value>, field: &'static str) -> Result<u32, ValidationError> {
    let number = value
        .filter(|value| value.is_number())
        .ok_or(ValidationError::DimensionNotNumeric { field })?;
    number
        .as_u64()
        .filter(|size| *size > 0)
        .and_then(|size| u32::try_from(size).ok())
        .ok_or_else(|| ValidationError::InvalidDimension {
            field,
            value: number.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NOW: i64 = 1_715_000_000_000;

    #[test_timeout::timeout]
    fn accepts_well_formed_update() {
        let update = validate_update_at(
            &json!({
                "pixels": [{"x": 12, "y": 8, "color": 0xFF0000}],
                "timestamp": 1234,
                "width": 32,
                "height": 32
            }),
            NOW,
        )
        .unwrap();
        assert_eq!(update.pixels, vec![Pixel::new(12, 8, 0xFF0000)]);
        assert_eq!(update.timestamp, 1234);
        assert_eq!((update.width, update.height), (32, 32));
    }

    #[test_timeout::timeout]
    fn assigns_receive_time_when_timestamp_absent_or_falsy() {
        for timestamp in [None, Some(json!(null)), Some(json!(0)), Some(json!(""))] {
            let mut candidate = json!({"pixels": [{"x": 0, "y": 0, "color": 1}], "width": 1, "height": 1});
            if let Some(value) = timestamp {
                candidate["timestamp"] = value;
            }
            let update = validate_update_at(&candidate, NOW).unwrap();
            assert_eq!(update.timestamp, NOW);
        }
    }

    #[test_timeout::timeout]
    fn out_of_range_pixels_are_structurally_valid() {
        let update = validate_update_at(
            &json!({"pixels": [{"x": -5, "y": 900, "color": 0}], "width": 4, "height": 4}),
            NOW,
        )
        .unwrap();
        assert_eq!(update.pixels[0], Pixel::new(-5, 900, 0));
    }

    #[test_timeout::timeout]
    fn checks_run_in_order() {
        assert_eq!(
            validate_update_at(&json!([1]), NOW),
            Err(ValidationError::NotAnObject)
        );
        assert_eq!(
            validate_update_at(&json!({"width": "x"}), NOW),
            Err(ValidationError::MissingPixels)
        );
        assert_eq!(
            validate_update_at(&json!({"pixels": {}, "width": 1, "height": 1}), NOW),
            Err(ValidationError::PixelsNotArray)
        );
        assert_eq!(
            validate_update_at(&json!({"pixels": [], "width": "x"}), NOW),
            Err(ValidationError::EmptyPixels)
        );
        assert_eq!(
            validate_update_at(&json!({"pixels": [{"x": 0, "y": 0, "color": 0}], "height": 1}), NOW),
            Err(ValidationError::DimensionNotNumeric { field: "width" })
        );
    }

    #[test_timeout::timeout]
    fn rejects_non_positive_dimensions() {
        let err = validate_update_at(
            &json!({"pixels": [{"x": 0, "y": 0, "color": 0}], "width": 8, "height": 0}),
            NOW,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidDimension {
                field: "height",
                value: "0".into()
            }
        );
    }

    #[test_timeout::timeout]
    fn reports_index_of_malformed_pixel() {
        let err = validate_update_at(
            &json!({
                "pixels": [{"x": 0, "y": 0, "color": 0}, {"x": 1, "color": 0}],
                "width": 2,
                "height": 2
            }),
            NOW,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::MalformedPixel { index: 1, .. }));
    }
}
