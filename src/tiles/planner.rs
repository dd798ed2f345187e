//! Viewport to tile planning

use std::ops::RangeInclusive;

use log::trace;

use crate::layout::{DocumentLayout, ScrollAxis};
use crate::render::{RequestId, TileRequest};

use super::cache::{DEFAULT_CACHE_SIZE, TileCache};
use super::types::TileBounds;

/// Target edge length of a tile in scaled pixels
pub const DEFAULT_PART_SIZE: f32 = 256.0;

/// Thumbnail size relative to the fitted page size
pub const DEFAULT_THUMBNAIL_RATIO: f32 = 0.3;

/// Extra distance around the viewport that is loaded eagerly
pub const DEFAULT_PRELOAD_OFFSET_DP: f32 = 20.0;

/// Scroll position, size and zoom of the visible area
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Horizontal distance from the document origin, in pixels
    pub scroll_x: f32,
    /// Vertical distance from the document origin, in pixels
    pub scroll_y: f32,
    pub width: f32,
    pub height: f32,
    pub zoom: f32,
}

impl Viewport {
    #[must_use]
    pub const fn new(scroll_x: f32, scroll_y: f32, width: f32, height: f32, zoom: f32) -> Self {
        Self {
            scroll_x,
            scroll_y,
            width,
            height,
            zoom,
        }
    }

    /// Scroll offsets as (primary, secondary) for the given axis
    #[must_use]
    pub fn scroll_along(&self, axis: ScrollAxis) -> (f32, f32) {
        match axis {
            ScrollAxis::Vertical => (self.scroll_y, self.scroll_x),
            ScrollAxis::Horizontal => (self.scroll_x, self.scroll_y),
        }
    }

    /// Viewport extents as (primary, secondary) for the given axis
    #[must_use]
    pub fn size_along(&self, axis: ScrollAxis) -> (f32, f32) {
        match axis {
            ScrollAxis::Vertical => (self.height, self.width),
            ScrollAxis::Horizontal => (self.width, self.height),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannerConfig {
    pub part_size: f32,
    pub thumbnail_ratio: f32,
    /// Preload margin already converted to pixels
    pub preload_px: f32,
    /// Maximum number of cells visited per pass
    pub budget: usize,
    pub best_quality: bool,
    pub annotations: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            thumbnail_ratio: DEFAULT_THUMBNAIL_RATIO,
            preload_px: DEFAULT_PRELOAD_OFFSET_DP,
            budget: DEFAULT_CACHE_SIZE,
            best_quality: false,
            annotations: false,
        }
    }
}

/// Number of rows and columns a page is cut into
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GridSize {
    pub rows: u32,
    pub cols: u32,
}

impl GridSize {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Page-relative bounds of one cell. Neighbouring cells share exact
    /// edges and the trailing row and column end at 1.0.
    #[must_use]
    pub fn cell_bounds(&self, row: u32, col: u32) -> TileBounds {
        let rows = self.rows as f32;
        let cols = self.cols as f32;
        TileBounds::new(
            col as f32 / cols,
            row as f32 / rows,
            ((col + 1) as f32 / cols).min(1.0),
            ((row + 1) as f32 / rows).min(1.0),
        )
    }
}

/// Grid for a page at `zoom`, sized so each cell is about `part_size` pixels
#[must_use]
pub fn grid_for_page(layout: &DocumentLayout, page: usize, zoom: f32, part_size: f32) -> GridSize {
    let size = layout.page_size(page);
    if size.is_degenerate() || !(zoom > 0.0) || !(part_size > 0.0) {
        return GridSize::default();
    }
    let part_width = part_size * (1.0 / size.width) / zoom;
    let part_height = part_size * (1.0 / size.height) / zoom;
    GridSize {
        rows: (1.0 / part_height).ceil().max(1.0) as u32,
        cols: (1.0 / part_width).ceil().max(1.0) as u32,
    }
}

/// Page and grid cell at one edge of the loaded range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Holder {
    page: usize,
    row: u32,
    col: u32,
    grid: GridSize,
}

/// Output of one planner pass
#[derive(Clone, Debug, Default)]
pub struct PlannedPass {
    pub pass: u64,
    /// Render requests in issue order; thumbnails come first
    pub requests: Vec<TileRequest>,
    /// High resolution cells covered, cached or requested
    pub cells: usize,
    pub pages: Option<RangeInclusive<usize>>,
}

/// Works out which tiles a viewport needs and which of them must be rendered
#[derive(Debug)]
pub struct ViewportPlanner {
    config: PlannerConfig,
    load_order: u64,
    pass: u64,
    next_request_id: u64,
}

impl ViewportPlanner {
    #[must_use]
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            load_order: 1,
            pass: 0,
            next_request_id: 1,
        }
    }

    #[must_use]
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Pass number of the latest plan
    #[must_use]
    pub fn current_pass(&self) -> u64 {
        self.pass
    }

    /// Run one pass: swap cache generations, then cover the viewport plus
    /// the preload margin with thumbnails and tiles.
    pub fn plan(
        &mut self,
        layout: &DocumentLayout,
        viewport: &Viewport,
        cache: &TileCache,
    ) -> PlannedPass {
        self.pass += 1;
        self.load_order = 1;
        cache.swap_generations();

        let mut out = PlannedPass {
            pass: self.pass,
            ..PlannedPass::default()
        };
        if layout.page_count() == 0 || !(viewport.zoom > 0.0) {
            return out;
        }

        let axis = layout.axis();
        let zoom = viewport.zoom;
        let preload = self.config.preload_px * zoom;
        let (primary, secondary) = viewport.scroll_along(axis);
        let (primary_len, secondary_len) = viewport.size_along(axis);
        let primary = primary.max(0.0);
        let secondary = secondary.max(0.0);

        let first = self.holder(
            layout,
            zoom,
            (primary - preload).max(0.0),
            (secondary - preload).max(0.0),
            false,
        );
        let last = self.holder(
            layout,
            zoom,
            primary + primary_len + preload,
            secondary + secondary_len + preload,
            true,
        );
        out.pages = Some(first.page..=last.page);

        for page in first.page..=last.page {
            self.load_thumbnail(layout, page, cache, &mut out);
        }

        let budget = self.config.budget;
        let span = last.page - first.page + 1;
        let vertical = axis.is_vertical();

        for page in first.page..=last.page {
            if out.cells >= budget {
                break;
            }
            let remaining = budget - out.cells;

            let (grid, rows, cols) = if page == first.page && span > 1 {
                let grid = first.grid;
                if vertical {
                    (grid, first.row..=last_index(grid.rows), 0..=last_index(grid.cols))
                } else {
                    (grid, 0..=last_index(grid.rows), first.col..=last_index(grid.cols))
                }
            } else if page == last.page && span > 1 {
                let grid = last.grid;
                if vertical {
                    (grid, 0..=last.row, 0..=last_index(grid.cols))
                } else {
                    (grid, 0..=last_index(grid.rows), 0..=last.col)
                }
            } else if span == 1 {
                (first.grid, first.row..=last.row, first.col..=last.col)
            } else {
                let grid = grid_for_page(layout, page, zoom, self.config.part_size);
                (grid, 0..=last_index(grid.rows), 0..=last_index(grid.cols))
            };

            if grid.is_empty() {
                continue;
            }
            out.cells += self.load_cells(page, grid, rows, cols, remaining, cache, &mut out.requests);
        }

        trace!(
            "pass {}: pages {:?}, {} cells, {} requests",
            out.pass,
            out.pages,
            out.cells,
            out.requests.len()
        );
        out
    }

    fn holder(
        &self,
        layout: &DocumentLayout,
        zoom: f32,
        primary: f32,
        secondary: f32,
        end: bool,
    ) -> Holder {
        let page = layout.page_at_offset(primary, zoom);
        let grid = grid_for_page(layout, page, zoom, self.config.part_size);
        if grid.is_empty() {
            return Holder {
                page,
                row: 0,
                col: 0,
                grid,
            };
        }

        let scaled = layout.scaled_page_size(page, zoom);
        let row_height = scaled.height / grid.rows as f32;
        let col_width = scaled.width / grid.cols as f32;
        let along = (primary - layout.page_offset(page, zoom)).max(0.0);
        let across = (secondary - layout.secondary_page_offset(page, zoom)).max(0.0);

        let (row, col) = if layout.axis().is_vertical() {
            (along / row_height, across / col_width)
        } else {
            (across / row_height, along / col_width)
        };

        let snap = |value: f32, count: u32| {
            let value = if end { value.ceil() } else { value.floor() };
            (value.max(0.0) as u32).min(count - 1)
        };

        Holder {
            page,
            row: snap(row, grid.rows),
            col: snap(col, grid.cols),
            grid,
        }
    }

    fn load_thumbnail(
        &mut self,
        layout: &DocumentLayout,
        page: usize,
        cache: &TileCache,
        out: &mut PlannedPass,
    ) {
        let size = layout.page_size(page);
        if size.is_degenerate() || cache.contains_thumbnail(page, &TileBounds::FULL_PAGE) {
            return;
        }
        let request = self.request(
            page,
            size.width * self.config.thumbnail_ratio,
            size.height * self.config.thumbnail_ratio,
            TileBounds::FULL_PAGE,
            true,
            0,
        );
        out.requests.push(request);
    }

    #[allow(clippy::too_many_arguments)]
    fn load_cells(
        &mut self,
        page: usize,
        grid: GridSize,
        rows: RangeInclusive<u32>,
        cols: RangeInclusive<u32>,
        limit: usize,
        cache: &TileCache,
        requests: &mut Vec<TileRequest>,
    ) -> usize {
        let page_width = self.config.part_size * grid.cols as f32;
        let page_height = self.config.part_size * grid.rows as f32;

        let mut loaded = 0;
        for row in rows {
            for col in cols.clone() {
                let bounds = grid.cell_bounds(row, col);
                let width = page_width * bounds.width();
                let height = page_height * bounds.height();
                if !(width > 0.0 && height > 0.0) {
                    continue;
                }

                let order = self.load_order;
                if !cache.promote_if_contained(page, &bounds, order).is_present() {
                    let request = self.request(page, width, height, bounds, false, order);
                    requests.push(request);
                }
                self.load_order += 1;
                loaded += 1;

                if loaded >= limit {
                    return loaded;
                }
            }
        }
        loaded
    }

    fn request(
        &mut self,
        page: usize,
        width: f32,
        height: f32,
        bounds: TileBounds,
        thumbnail: bool,
        load_order: u64,
    ) -> TileRequest {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        TileRequest {
            id,
            page,
            width,
            height,
            bounds,
            thumbnail,
            load_order,
            pass: self.pass,
            best_quality: self.config.best_quality,
            annotations: self.config.annotations,
        }
    }
}

fn last_index(count: u32) -> u32 {
    count.saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::layout::{LayoutOptions, PageSize};
    use crate::tiles::{PixelBuffer, PixelFormat, Tile};

    fn layout(pages: &[(f32, f32)], view: (f32, f32)) -> DocumentLayout {
        DocumentLayout::new(
            pages.iter().map(|&(w, h)| PageSize::new(w, h)).collect(),
            LayoutOptions::default(),
            PageSize::new(view.0, view.1),
        )
    }

    fn config(budget: usize) -> PlannerConfig {
        PlannerConfig {
            preload_px: 0.0,
            budget,
            ..PlannerConfig::default()
        }
    }

    fn rendered(request: &TileRequest) -> Tile {
        Tile {
            page: request.page,
            bounds: request.bounds,
            thumbnail: request.thumbnail,
            load_order: request.load_order,
            pass: request.pass,
            pixels: Arc::new(PixelBuffer::try_new(1, 1, PixelFormat::Rgb565, 1).expect("alloc")),
        }
    }

    #[test]
    fn grid_cells_cover_page_exactly() {
        for (rows, cols) in [(1, 1), (3, 7), (5, 3), (13, 11)] {
            let grid = GridSize { rows, cols };
            let mut area = 0.0f64;
            for row in 0..rows {
                for col in 0..cols {
                    let b = grid.cell_bounds(row, col);
                    assert!(b.width() > 0.0 && b.height() > 0.0);
                    if col + 1 < cols {
                        assert_eq!(b.right, grid.cell_bounds(row, col + 1).left);
                    } else {
                        assert_eq!(b.right, 1.0);
                    }
                    if row + 1 < rows {
                        assert_eq!(b.bottom, grid.cell_bounds(row + 1, col).top);
                    } else {
                        assert_eq!(b.bottom, 1.0);
                    }
                    area += f64::from(b.width()) * f64::from(b.height());
                }
            }
            assert!((area - 1.0).abs() < 1e-5, "{rows}x{cols}: {area}");
        }
    }

    #[test]
    fn grid_scales_with_zoom() {
        let layout = layout(&[(600.0, 800.0)], (300.0, 500.0));
        assert_eq!(
            grid_for_page(&layout, 0, 1.0, 256.0),
            GridSize { rows: 2, cols: 2 }
        );
        assert_eq!(
            grid_for_page(&layout, 0, 3.0, 256.0),
            GridSize { rows: 5, cols: 4 }
        );
    }

    #[test]
    fn planner_requests_thumbnails_first() {
        let layout = layout(&[(600.0, 800.0), (600.0, 800.0)], (300.0, 500.0));
        let cache = TileCache::new(120, 8);
        let mut planner = ViewportPlanner::new(config(120));

        let pass = planner.plan(&layout, &Viewport::new(0.0, 200.0, 300.0, 500.0, 1.0), &cache);

        assert_eq!(pass.pages, Some(0..=1));
        assert!(pass.requests[0].thumbnail && pass.requests[1].thumbnail);
        assert_eq!(pass.requests[0].bounds, TileBounds::FULL_PAGE);
        assert!((pass.requests[0].width - 90.0).abs() < 1e-3);
        assert!(pass.requests[2..].iter().all(|r| !r.thumbnail));
    }

    #[test]
    fn planner_single_page_loads_visible_cells() {
        let layout = layout(&[(600.0, 1600.0)], (300.0, 500.0));
        let cache = TileCache::new(120, 8);
        let mut planner = ViewportPlanner::new(config(120));

        // page 300x800 -> grid 4 rows x 2 cols of 200px rows; the end edge
        // at 1.5 rows rounds up to row 2
        let pass = planner.plan(&layout, &Viewport::new(0.0, 0.0, 300.0, 300.0, 1.0), &cache);
        let tiles: Vec<_> = pass.requests.iter().filter(|r| !r.thumbnail).collect();

        assert_eq!(pass.cells, 6);
        let rows: Vec<_> = tiles.iter().map(|r| r.bounds.top).collect();
        assert_eq!(rows, vec![0.0, 0.0, 0.25, 0.25, 0.5, 0.5]);
        let orders: Vec<_> = tiles.iter().map(|r| r.load_order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn planner_respects_budget() {
        let layout = layout(&[(600.0, 800.0); 6], (300.0, 500.0));
        let cache = TileCache::new(120, 8);
        let mut planner = ViewportPlanner::new(config(3));

        let pass = planner.plan(&layout, &Viewport::new(0.0, 300.0, 300.0, 1200.0, 1.0), &cache);

        assert_eq!(pass.cells, 3);
        let thumbs = pass.requests.iter().filter(|r| r.thumbnail).count();
        let tiles = pass.requests.iter().filter(|r| !r.thumbnail).count();
        assert_eq!(thumbs, 4);
        assert_eq!(tiles, 3);
    }

    #[test]
    fn planner_promotes_cached_tiles() {
        let layout = layout(&[(600.0, 800.0)], (300.0, 500.0));
        let cache = TileCache::new(120, 8);
        let mut planner = ViewportPlanner::new(config(120));
        let viewport = Viewport::new(0.0, 0.0, 300.0, 400.0, 1.0);

        let first = planner.plan(&layout, &viewport, &cache);
        for request in &first.requests {
            if request.thumbnail {
                cache.insert_thumbnail(rendered(request));
            } else {
                cache.insert(rendered(request));
            }
        }
        assert_eq!(cache.active_len(), 4);

        let second = planner.plan(&layout, &viewport, &cache);

        assert_eq!(second.pass, first.pass + 1);
        assert!(second.requests.is_empty());
        assert_eq!(second.cells, 4);
        assert_eq!(cache.active_len(), 4);
        assert_eq!(cache.passive_len(), 0);
    }

    #[test]
    fn planner_resets_load_order_each_pass() {
        let layout = layout(&[(600.0, 800.0)], (300.0, 500.0));
        let cache = TileCache::new(120, 8);
        let mut planner = ViewportPlanner::new(config(120));
        let viewport = Viewport::new(0.0, 0.0, 300.0, 400.0, 1.0);

        planner.plan(&layout, &viewport, &cache);
        let second = planner.plan(&layout, &viewport, &cache);

        let first_tile = second.requests.iter().find(|r| !r.thumbnail).map(|r| r.load_order);
        assert_eq!(first_tile, Some(1));
    }

    #[test]
    fn planner_multi_page_takes_tail_and_head() {
        let layout = layout(&[(600.0, 800.0); 3], (300.0, 500.0));
        let cache = TileCache::new(120, 8);
        let mut planner = ViewportPlanner::new(config(120));

        // pages are 300x400 with 2x2 grids of 200px rows
        let pass = planner.plan(&layout, &Viewport::new(0.0, 200.0, 300.0, 200.0, 1.0), &cache);
        let tiles: Vec<_> = pass
            .requests
            .iter()
            .filter(|r| !r.thumbnail)
            .map(|r| (r.page, r.bounds.top))
            .collect();

        assert_eq!(pass.pages, Some(0..=1));
        assert_eq!(tiles, vec![(0, 0.5), (0, 0.5), (1, 0.0), (1, 0.0)]);
    }

    #[test]
    fn planner_empty_document() {
        let layout = layout(&[], (300.0, 500.0));
        let cache = TileCache::new(120, 8);
        let mut planner = ViewportPlanner::new(config(120));

        let pass = planner.plan(&layout, &Viewport::new(0.0, 0.0, 300.0, 500.0, 1.0), &cache);
        assert!(pass.requests.is_empty());
        assert_eq!(pass.pages, None);
    }
}
