//! Tile model, cache and viewport planning

mod cache;
mod ordered;
mod planner;
mod thumbnails;
mod types;

pub use cache::{DEFAULT_CACHE_SIZE, DEFAULT_THUMBNAIL_CACHE_SIZE, Lookup, TileCache};
pub use ordered::OrderedTileSet;
pub use planner::{
    DEFAULT_PART_SIZE, DEFAULT_PRELOAD_OFFSET_DP, DEFAULT_THUMBNAIL_RATIO, GridSize, PlannedPass,
    PlannerConfig, Viewport, ViewportPlanner, grid_for_page,
};
pub use thumbnails::ThumbnailStore;
pub use types::{PixelBuffer, PixelFormat, Tile, TileBounds, TileKey};
