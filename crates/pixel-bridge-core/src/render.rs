use std::fmt::Write as _;

use crate::canvas::{Pixel, Rgb};

/// Largest width or height a grid is laid out at; larger canvases are cropped.
pub const MAX_RENDER_DIMENSION: u32 = 4096;

const BLANK: char = ' ';
const MARKED: char = '#';

/// A `height` x `width` character grid with the color of each marked cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasGrid {
    width: usize,
    height: usize,
    cells: Vec<Option<Rgb>>,
}

/// Lays `pixels` out on a blank grid. Pixels outside `0..width` x `0..height`
/// are skipped; a later pixel at the same cell wins. Each dimension is capped
/// at [`MAX_RENDER_DIMENSION`].
pub fn render(pixels: &[Pixel], width: u32, height: u32) -> CanvasGrid {
    let width = width.min(MAX_RENDER_DIMENSION) as usize;
    let height = height.min(MAX_RENDER_DIMENSION) as usize;
    let mut cells = vec![None; width * height];
    for pixel in pixels {
        let (Ok(x), Ok(y)) = (usize::try_from(pixel.x), usize::try_from(pixel.y)) else {
            continue;
        };
        if x < width && y < height {
            cells[y * width + x] = Some(pixel.rgb());
        }
    }
    CanvasGrid {
        width,
        height,
        cells,
    }
}

impl CanvasGrid {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cell(&self, x: usize, y: usize) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.cells[y * self.width + x]
    }

    pub fn marked_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_some()).count()
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Option<Rgb>]> {
        self.cells.chunks(self.width.max(1))
    }

    /// Plain rendering: `#` for marked cells, a space otherwise, one line per
    /// row with no trailing newline.
    pub fn to_text(&self) -> String {
        self.rows()
            .map(|row| {
                row.iter()
                    .map(|cell| if cell.is_some() { MARKED } else { BLANK })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 24-bit color rendering for terminals, two columns per cell so the
    /// drawing keeps a square aspect.
    pub fn to_ansi(&self) -> String {
        let mut out = String::new();
        for (index, row) in self.rows().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            for cell in row {
                match cell {
                    Some(Rgb { r, g, b }) => {
                        let _ = write!(out, "\x1b[38;2;{r};{g};{b}m\u{2588}\u{2588}\x1b[0m");
                    }
                    None => out.push_str("  "),
                }
            }
        }
        out
    }
}
