use std::sync::Arc;

use metrics::{counter, histogram};
use pixel_bridge_core::{
    check_shape, decode_envelope, validate_update, FrameError, ServerMessage, ValidationError,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{StoreError, UpdateLog};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("Invalid update: {0}")]
    Invalid(#[from] ValidationError),
    #[error("Failed to save update: {0}")]
    Persist(#[from] StoreError),
}

impl IngestError {
    /// Metric label for the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Frame(err) => err.kind().as_str(),
            IngestError::Invalid(_) => "validation",
            IngestError::Persist(_) => "persistence",
        }
    }
}

/// Turns inbound editor frames into durable log entries.
///
/// Frames are independent: there is no per-connection state, and every frame
/// gets exactly one reply.
#[derive(Clone)]
pub struct Ingestor {
    log: Arc<UpdateLog>,
}

impl Ingestor {
    pub fn new(log: Arc<UpdateLog>) -> Self {
        Self { log }
    }

    pub fn log(&self) -> &Arc<UpdateLog> {
        &self.log
    }

    /// Processes one text frame and returns the reply for the sender.
    pub async fn handle_text(&self, text: &str) -> ServerMessage {
        counter!("pixel_bridge_frames_total", 1);
        debug!(bytes = text.len(), "received frame");
        match self.ingest(text).await {
            Ok(pixels) => {
                ServerMessage::info(format!("Successfully received and saved {pixels} pixels"))
            }
            Err(err) => {
                warn!(kind = err.kind(), error = %err, detail = ?err, "rejected frame");
                counter!("pixel_bridge_frames_rejected_total", 1, "kind" => err.kind());
                if matches!(err, IngestError::Persist(_)) {
                    counter!("pixel_bridge_persist_failures_total", 1);
                }
                ServerMessage::error(err.to_string())
            }
        }
    }

    /// Returns the number of pixels saved.
    async fn ingest(&self, text: &str) -> Result<usize, IngestError> {
        let candidate = decode_envelope(text)?;
        check_shape(&candidate)?;
        let update = validate_update(&candidate)?;
        let pixels = update.pixel_count();
        debug!(
            pixels,
            width = update.width,
            height = update.height,
            "accepted update"
        );

        // The log publishes `update` as LastUpdate even when the write fails.
        let total = self.log.append(update).await?;

        counter!("pixel_bridge_updates_persisted_total", 1);
        histogram!("pixel_bridge_pixels_per_update", pixels as f64);
        debug!(pixels, total, "persisted update");
        Ok(pixels)
    }
}
