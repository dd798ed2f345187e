//! Render request and response types

use crate::error::PageError;
use crate::tiles::{Tile, TileBounds};

use super::backend::PixelRect;

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// One tile to rasterize
#[derive(Clone, Debug, PartialEq)]
pub struct TileRequest {
    pub id: RequestId,
    /// View page index (0-indexed)
    pub page: usize,
    /// Target buffer width in pixels before rounding
    pub width: f32,
    /// Target buffer height in pixels before rounding
    pub height: f32,
    pub bounds: TileBounds,
    pub thumbnail: bool,
    /// Cache priority the tile is stored under
    pub load_order: u64,
    /// Planner pass that issued the request
    pub pass: u64,
    /// Render into 32-bit buffers instead of 16-bit
    pub best_quality: bool,
    pub annotations: bool,
}

impl TileRequest {
    /// Rounded buffer dimensions
    #[must_use]
    pub fn buffer_size(&self) -> (u32, u32) {
        (round_dimension(self.width), round_dimension(self.height))
    }

    /// Rectangle the whole page occupies in tile pixel space, so that the
    /// requested bounds land exactly on the buffer.
    #[must_use]
    pub fn render_rect(&self) -> PixelRect {
        let (width, height) = self.buffer_size();
        render_rect(width, height, &self.bounds)
    }
}

fn round_dimension(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(u32::MAX as f32) as u32
    } else {
        0
    }
}

/// Map the buffer rectangle `(0, 0, width, height)` through
/// translate(-left·width, -top·height) then scale(1/bounds width, 1/bounds height),
/// rounding the result to whole pixels.
#[must_use]
pub fn render_rect(width: u32, height: u32, bounds: &TileBounds) -> PixelRect {
    let w = width as f32;
    let h = height as f32;
    let scale_x = 1.0 / bounds.width();
    let scale_y = 1.0 / bounds.height();

    let left = (-bounds.left * w) * scale_x;
    let top = (-bounds.top * h) * scale_y;
    let right = (w - bounds.left * w) * scale_x;
    let bottom = (h - bounds.top * h) * scale_y;

    let x = left.round() as i32;
    let y = top.round() as i32;
    PixelRect {
        x,
        y,
        width: (right.round() as i32 - x).max(0) as u32,
        height: (bottom.round() as i32 - y).max(0) as u32,
    }
}

/// Messages the render worker sends back to the consumer
#[derive(Debug)]
pub enum RenderResponse {
    /// Rendered tile, tagged with the pass that requested it
    Tile(Tile),

    /// Page could not be opened
    PageError { id: RequestId, error: PageError },
}
