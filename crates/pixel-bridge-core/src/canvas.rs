use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A single painted cell. Coordinates are not bounded by the canvas here;
/// out-of-range pixels are kept as sent and skipped by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pixel {
    pub x: i64,
    pub y: i64,
    /// Packed `0xRRGGBB`, no alpha.
    pub color: u32,
}

impl Pixel {
    pub fn new(x: i64, y: i64, color: u32) -> Self {
        Self { x, y, color }
    }

    pub fn rgb(&self) -> Rgb {
        Rgb::from_packed(self.color)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn from_packed(color: u32) -> Self {
        Self {
            r: ((color >> 16) & 0xFF) as u8,
            g: ((color >> 8) & 0xFF) as u8,
            b: (color & 0xFF) as u8,
        }
    }

    pub fn packed(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }
}

/// One accepted canvas snapshot as sent by the editor.
///
/// Instances are only produced by [`crate::validate_update`] (or read back
/// from the durable log), so `pixels` is non-empty and both dimensions are
/// positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasUpdate {
    pub pixels: Vec<Pixel>,
    /// Epoch milliseconds. Assigned by the receiver when the sender left it out.
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
}

impl CanvasUpdate {
    pub fn pixel_count(&self) -> usize {
        self.pixels.len()
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
