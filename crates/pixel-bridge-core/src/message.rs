use serde::{Deserialize, Serialize};

use crate::canvas::CanvasUpdate;

/// Result of an analysis pass, relayed back to the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingAnalysis {
    pub description: String,
    pub confidence: f64,
    pub timestamp: i64,
}

/// Frames the bridge writes to an editor connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Info(String),
    Error(String),
    Analysis(DrawingAnalysis),
    PixelUpdate(CanvasUpdate),
}

impl ServerMessage {
    pub fn info(message: impl Into<String>) -> Self {
        ServerMessage::Info(message.into())
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(message.into())
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ServerMessage::Error(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Pixel;
    use serde_json::json;

    #[test_timeout::timeout]
    fn text_replies_use_type_and_data() {
        let value = serde_json::to_value(ServerMessage::info("saved 3 pixels")).unwrap();
        assert_eq!(value, json!({"type": "info", "data": "saved 3 pixels"}));

        let value = serde_json::to_value(ServerMessage::error("Invalid pixels array")).unwrap();
        assert_eq!(value, json!({"type": "error", "data": "Invalid pixels array"}));
    }

    #[test_timeout::timeout]
    fn analysis_payload_is_structured() {
        let message = ServerMessage::Analysis(DrawingAnalysis {
            description: "heart".into(),
            confidence: 0.75,
            timestamp: 10,
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "analysis");
        assert_eq!(value["data"]["description"], "heart");
        let parsed: ServerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, message);
    }

    #[test_timeout::timeout]
    fn pixel_update_echo_carries_the_update() {
        let message = ServerMessage::PixelUpdate(CanvasUpdate {
            pixels: vec![Pixel::new(0, 0, 0xFFFFFF)],
            timestamp: 5,
            width: 1,
            height: 1,
        });
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["type"], "pixel_update");
        assert_eq!(value["data"]["pixels"][0]["color"], 0xFFFFFF);
    }
}
