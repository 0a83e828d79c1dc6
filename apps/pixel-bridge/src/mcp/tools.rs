use pixel_bridge_core::{render, CanvasUpdate, Pixel, MAX_RENDER_DIMENSION};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::info;

use crate::history;
use crate::store::UpdateLog;

pub const ANALYZE_DRAWING: &str = "analyze-drawing";
pub const LIST_SAVED_DRAWINGS: &str = "list-saved-drawings";
pub const CLEAR_ALL_DRAWINGS: &str = "clear-all-drawings";

const NO_PIXELS: &str = "No pixel data provided to analyze.";

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub input_schema: Value,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    Unknown(String),
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: &'static str, reason: String },
}

impl ToolError {
    fn invalid(tool: &'static str, reason: impl Into<String>) -> Self {
        ToolError::InvalidArguments {
            tool,
            reason: reason.into(),
        }
    }
}

pub fn list_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor {
            name: ANALYZE_DRAWING,
            description: "Analyze pixel art drawings using a standard 2D coordinate system where \
                (0,0) is at the top-left corner, with x increasing rightward and y increasing \
                downward. Provide specific pattern recognition (e.g., 'stickman', 'chess piece', \
                'heart') rather than generic descriptions. The input comes from a sprite/pixel art \
                editor where each pixel is deliberately placed for precise artwork creation. \
                Omit all arguments to analyze the most recent drawing received from the editor.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pixels": {
                        "type": "array",
                        "description": "Non-transparent pixels with exact integer coordinates \
                            (origin at top-left, x rightward, y downward) and packed 0xRRGGBB colors",
                        "items": {
                            "type": "object",
                            "properties": {
                                "x": {"type": "integer"},
                                "y": {"type": "integer"},
                                "color": {"type": "integer", "minimum": 0}
                            },
                            "required": ["x", "y", "color"]
                        }
                    },
                    "width": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_RENDER_DIMENSION,
                        "description": "Total width of the sprite canvas in pixels (common sizes: 16, 32, 64, 128)"
                    },
                    "height": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_RENDER_DIMENSION,
                        "description": "Total height of the sprite canvas in pixels (common sizes: 16, 32, 64, 128)"
                    }
                }
            }),
        },
        ToolDescriptor {
            name: LIST_SAVED_DRAWINGS,
            description: "List all saved drawings in storage",
            input_schema: json!({"type": "object", "properties": {}}),
        },
        ToolDescriptor {
            name: CLEAR_ALL_DRAWINGS,
            description: "Delete all saved drawings from storage",
            input_schema: json!({"type": "object", "properties": {}}),
        },
    ]
}

/// Runs the named tool and returns its text payload.
pub async fn call_tool(log: &UpdateLog, name: &str, arguments: &Value) -> Result<String, ToolError> {
    match name {
        ANALYZE_DRAWING => {
            let request = AnalyzeRequest::from_arguments(arguments)?;
            Ok(analyze_drawing(log, request))
        }
        LIST_SAVED_DRAWINGS => Ok(list_saved_drawings(log).await),
        CLEAR_ALL_DRAWINGS => Ok(clear_all_drawings(log).await),
        other => Err(ToolError::Unknown(other.to_string())),
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum AnalyzeRequest {
    Explicit {
        pixels: Vec<Pixel>,
        width: u32,
        height: u32,
    },
    Latest,
}

impl AnalyzeRequest {
    pub fn from_arguments(arguments: &Value) -> Result<Self, ToolError> {
        #[derive(Deserialize)]
        struct Helper {
            pixels: Option<Vec<Pixel>>,
            width: Option<u32>,
            height: Option<u32>,
        }

        let arguments = match arguments {
            Value::Null => json!({}),
            other => other.clone(),
        };
        let helper: Helper = serde_json::from_value(arguments)
            .map_err(|err| ToolError::invalid(ANALYZE_DRAWING, err.to_string()))?;

        match (helper.pixels, helper.width, helper.height) {
            (None, None, None) => Ok(AnalyzeRequest::Latest),
            (Some(pixels), Some(width), Some(height)) => {
                check_dimension("width", width)?;
                check_dimension("height", height)?;
                Ok(AnalyzeRequest::Explicit {
                    pixels,
                    width,
                    height,
                })
            }
            _ => Err(ToolError::invalid(
                ANALYZE_DRAWING,
                "pixels, width and height must be given together",
            )),
        }
    }
}

fn check_dimension(field: &str, value: u32) -> Result<(), ToolError> {
    if (1..=MAX_RENDER_DIMENSION).contains(&value) {
        Ok(())
    } else {
        Err(ToolError::invalid(
            ANALYZE_DRAWING,
            format!("{field} must be between 1 and {MAX_RENDER_DIMENSION}, got {value}"),
        ))
    }
}

fn analyze_drawing(log: &UpdateLog, request: AnalyzeRequest) -> String {
    let (pixels, width, height) = match request {
        AnalyzeRequest::Explicit {
            pixels,
            width,
            height,
        } => (pixels, width, height),
        AnalyzeRequest::Latest => match log.last_update() {
            Some(CanvasUpdate {
                pixels,
                width,
                height,
                ..
            }) => (pixels, width, height),
            None => return NO_PIXELS.to_string(),
        },
    };
    if pixels.is_empty() {
        return NO_PIXELS.to_string();
    }

    info!(
        pixels = pixels.len(),
        width, height, "analyzing pixel art"
    );
    let grid = render(&pixels, width, height);
    format!(
        "Drawing Analysis ({width}x{height} canvas):\n\nVisual Representation:\n{}",
        grid.to_text()
    )
}

async fn list_saved_drawings(log: &UpdateLog) -> String {
    let summaries = history::list_summaries(log).await;
    if summaries.is_empty() {
        return "No saved drawings found.".to_string();
    }
    let blocks = summaries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n");
    format!("Found {} saved drawings:\n\n{blocks}", summaries.len())
}

async fn clear_all_drawings(log: &UpdateLog) -> String {
    let report = history::clear_all(log).await;
    let mut text = format!(
        "Successfully deleted {} drawings from storage.",
        report.removed
    );
    if let Some(err) = report.persist_error {
        text.push_str(&format!("\nWarning: the cleared state could not be saved: {err}"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn log_in(dir: &std::path::Path) -> UpdateLog {
        UpdateLog::load_in(dir).await.unwrap()
    }

    fn sample(width: u32, height: u32) -> CanvasUpdate {
        CanvasUpdate {
            pixels: vec![Pixel::new(0, 0, 0xFF0000), Pixel::new(1, 1, 0x00FF00)],
            timestamp: 1_700_000_000_000,
            width,
            height,
        }
    }

    #[test_timeout::tokio_timeout_test]
    async fn analyze_renders_requested_canvas() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path()).await;
        let text = call_tool(
            &log,
            ANALYZE_DRAWING,
            &json!({
                "pixels": [
                    {"x": 12, "y": 8, "color": 0xFF0000},
                    {"x": 13, "y": 8, "color": 0xFF0000},
                    {"x": 40, "y": 8, "color": 0xFF0000}
                ],
                "width": 32,
                "height": 32
            }),
        )
        .await
        .unwrap();

        let (header, grid) = text
            .split_once("Visual Representation:\n")
            .expect("grid section");
        assert_eq!(header, "Drawing Analysis (32x32 canvas):\n\n");
        let rows: Vec<&str> = grid.split('\n').collect();
        assert_eq!(rows.len(), 32);
        assert!(rows.iter().all(|row| row.len() == 32));
        assert_eq!(rows[8].find('#'), Some(12));
        assert_eq!(grid.matches('#').count(), 2);
    }

    #[test_timeout::tokio_timeout_test]
    async fn analyze_without_arguments_uses_latest_update() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path()).await;
        assert_eq!(
            call_tool(&log, ANALYZE_DRAWING, &json!({})).await.unwrap(),
            NO_PIXELS
        );

        log.set_last_update(sample(2, 2));
        let text = call_tool(&log, ANALYZE_DRAWING, &Value::Null).await.unwrap();
        assert!(text.ends_with("Visual Representation:\n# \n #"), "{text}");
    }

    #[test_timeout::tokio_timeout_test]
    async fn analyze_with_empty_pixels_reports_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path()).await;
        let text = call_tool(
            &log,
            ANALYZE_DRAWING,
            &json!({"pixels": [], "width": 8, "height": 8}),
        )
        .await
        .unwrap();
        assert_eq!(text, NO_PIXELS);
    }

    #[test_timeout::timeout]
    fn analyze_arguments_are_validated() {
        let partial = AnalyzeRequest::from_arguments(&json!({"pixels": []}));
        assert!(matches!(partial, Err(ToolError::InvalidArguments { .. })));

        let zero = AnalyzeRequest::from_arguments(&json!({"pixels": [], "width": 0, "height": 4}));
        assert!(matches!(zero, Err(ToolError::InvalidArguments { .. })));

        let huge = AnalyzeRequest::from_arguments(&json!({"pixels": [], "width": 5000, "height": 4}));
        assert!(matches!(huge, Err(ToolError::InvalidArguments { .. })));

        let bad_pixel =
            AnalyzeRequest::from_arguments(&json!({"pixels": [{"x": 1}], "width": 4, "height": 4}));
        assert!(matches!(bad_pixel, Err(ToolError::InvalidArguments { .. })));

        let wrong_type = AnalyzeRequest::from_arguments(&json!("pixels"));
        assert!(matches!(wrong_type, Err(ToolError::InvalidArguments { .. })));
    }

    #[test_timeout::tokio_timeout_test]
    async fn list_and_clear_report_history() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path()).await;
        assert_eq!(
            call_tool(&log, LIST_SAVED_DRAWINGS, &json!({})).await.unwrap(),
            "No saved drawings found."
        );

        log.append(sample(32, 32)).await.unwrap();
        log.append(sample(16, 8)).await.unwrap();
        let listing = call_tool(&log, LIST_SAVED_DRAWINGS, &json!({})).await.unwrap();
        assert!(listing.starts_with("Found 2 saved drawings:\n\nDrawing 1:\n"));
        assert!(listing.contains("  Canvas: 32x32\n"));
        assert!(listing.contains("Drawing 2:\n"));
        assert!(listing.ends_with("  Canvas: 16x8\n  ---"));

        assert_eq!(
            call_tool(&log, CLEAR_ALL_DRAWINGS, &json!({})).await.unwrap(),
            "Successfully deleted 2 drawings from storage."
        );
        assert!(log.is_empty().await);
    }

    #[test_timeout::tokio_timeout_test]
    async fn unknown_tool_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let log = log_in(dir.path()).await;
        assert_eq!(
            call_tool(&log, "draw-something", &json!({})).await,
            Err(ToolError::Unknown("draw-something".into()))
        );
    }

    #[test_timeout::timeout]
    fn descriptors_expose_schemas() {
        let tools = list_tools();
        let names: Vec<_> = tools.iter().map(|tool| tool.name).collect();
        assert_eq!(names, vec![ANALYZE_DRAWING, LIST_SAVED_DRAWINGS, CLEAR_ALL_DRAWINGS]);
        let value = serde_json::to_value(&tools[0]).unwrap();
        assert_eq!(value["inputSchema"]["properties"]["width"]["minimum"], 1);
    }
}
