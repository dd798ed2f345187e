// Export modules for use in tests
pub mod error;
pub mod layout;
pub mod panic_handler;
pub mod render;
pub mod settings;
pub mod tiles;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::{AllocError, OpenError, PageError, RasterFault, ViewerError};
pub use layout::{DocumentLayout, FitPolicy, LayoutOptions, PageSize, ScrollAxis};
pub use render::{DocumentSource, Rasterizer};
pub use tiles::{Tile, TileBounds, TileCache, Viewport};
pub use viewer::{TileViewer, ViewerEvent, ViewerOptions, ViewerState};
