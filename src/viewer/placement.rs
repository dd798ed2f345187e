//! Where pages and tiles land on screen

use crate::layout::{DocumentLayout, PageSize, ScrollAxis};
use crate::render::PixelRect;
use crate::tiles::{Tile, Viewport};

/// Scaled size and offsets of one page at a zoom factor
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub size: PageSize,
    /// Distance from the document start along the scroll axis
    pub primary_offset: f32,
    /// Centring offset across the scroll axis
    pub secondary_offset: f32,
}

impl PageGeometry {
    #[must_use]
    pub fn of(layout: &DocumentLayout, page: usize, zoom: f32) -> Self {
        Self {
            size: layout.scaled_page_size(page, zoom),
            primary_offset: layout.page_offset(page, zoom),
            secondary_offset: layout.secondary_page_offset(page, zoom),
        }
    }

    /// Page origin in document pixels as (x, y)
    #[must_use]
    pub fn origin(&self, axis: ScrollAxis) -> (f32, f32) {
        match axis {
            ScrollAxis::Vertical => (self.secondary_offset, self.primary_offset),
            ScrollAxis::Horizontal => (self.primary_offset, self.secondary_offset),
        }
    }
}

/// A drawable tile and its destination in viewport pixels
#[derive(Clone, Debug)]
pub struct PlacedTile {
    pub tile: Tile,
    pub dest: PixelRect,
}

/// Destination of `tile` relative to the viewport origin, or `None` when it
/// falls outside the viewport
#[must_use]
pub fn place_tile(layout: &DocumentLayout, viewport: &Viewport, tile: &Tile) -> Option<PixelRect> {
    let geometry = PageGeometry::of(layout, tile.page, viewport.zoom);
    if geometry.size.is_degenerate() {
        return None;
    }
    let (page_x, page_y) = geometry.origin(layout.axis());

    let left = page_x + tile.bounds.left * geometry.size.width - viewport.scroll_x;
    let top = page_y + tile.bounds.top * geometry.size.height - viewport.scroll_y;
    let width = tile.bounds.width() * geometry.size.width;
    let height = tile.bounds.height() * geometry.size.height;

    if left + width <= 0.0
        || top + height <= 0.0
        || left >= viewport.width
        || top >= viewport.height
    {
        return None;
    }

    let x = left as i32;
    let y = top as i32;
    let dest = PixelRect {
        x,
        y,
        width: ((left + width) as i32 - x).max(0) as u32,
        height: ((top + height) as i32 - y).max(0) as u32,
    };
    (dest.width > 0 && dest.height > 0).then_some(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutOptions;
    use crate::tiles::{PixelBuffer, PixelFormat, TileBounds};
    use std::sync::Arc;

    fn layout(axis: ScrollAxis) -> DocumentLayout {
        DocumentLayout::new(
            vec![PageSize::new(600.0, 800.0), PageSize::new(300.0, 400.0)],
            LayoutOptions {
                axis,
                ..LayoutOptions::default()
            },
            PageSize::new(300.0, 500.0),
        )
    }

    fn tile(page: usize, bounds: TileBounds) -> Tile {
        Tile {
            page,
            bounds,
            thumbnail: false,
            load_order: 1,
            pass: 1,
            pixels: Arc::new(
                PixelBuffer::try_new(1, 1, PixelFormat::Rgb565, u64::MAX).expect("alloc"),
            ),
        }
    }

    #[test]
    fn placement_follows_page_offset_and_scroll() {
        let layout = layout(ScrollAxis::Vertical);
        let viewport = Viewport::new(0.0, 100.0, 300.0, 500.0, 1.0);

        // Page 1 is 150x200 at y=400; its lower half starts at 500
        let dest = place_tile(&layout, &viewport, &tile(1, TileBounds::new(0.0, 0.5, 1.0, 1.0)))
            .expect("visible");
        assert_eq!(
            dest,
            PixelRect {
                x: 75,
                y: 400,
                width: 150,
                height: 100
            }
        );
    }

    #[test]
    fn placement_culls_offscreen_tiles() {
        let layout = layout(ScrollAxis::Vertical);
        let viewport = Viewport::new(0.0, 500.0, 300.0, 500.0, 1.0);
        assert!(place_tile(&layout, &viewport, &tile(0, TileBounds::new(0.0, 0.0, 1.0, 0.5))).is_none());
        assert!(place_tile(&layout, &viewport, &tile(1, TileBounds::FULL_PAGE)).is_some());
    }

    #[test]
    fn placement_swaps_axes_when_horizontal() {
        let layout = layout(ScrollAxis::Horizontal);
        let geometry = PageGeometry::of(&layout, 1, 1.0);
        let (x, y) = geometry.origin(ScrollAxis::Horizontal);
        assert_eq!(x, geometry.primary_offset);
        assert_eq!(y, geometry.secondary_offset);
        assert!(x > 0.0);
    }
}
