//! Shared primitives for the pixel editor bridge.
//!
//! Nothing in this crate touches the network or the file system: it holds the
//! canvas data model, the inbound frame decoder, the update validator, the
//! outbound message type and the text renderer used by the analysis tool.

mod canvas;
mod frame;
mod message;
mod render;
mod validate;

pub use canvas::{now_millis, CanvasUpdate, Pixel, Rgb};
pub use frame::{check_shape, decode_envelope, FrameError, FrameErrorKind, PIXEL_UPDATE};
pub use message::{DrawingAnalysis, ServerMessage};
pub use render::{render, CanvasGrid, MAX_RENDER_DIMENSION};
pub use validate::{validate_update, validate_update_at, ValidationError};
