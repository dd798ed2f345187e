//! Consumer-facing events and viewer lifecycle

use crate::error::{OpenError, PageError};
use crate::tiles::Tile;

/// Lifecycle of a [`super::TileViewer`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewerState {
    /// No document; ready for `open`
    #[default]
    Recycled,
    /// Open task running
    Loading,
    /// Document open, nothing drawn yet
    Loaded,
    /// At least one tile has been rendered
    Shown,
    /// Open failed; recycle before trying again
    Error,
}

impl ViewerState {
    /// True while a document is usable
    #[must_use]
    pub fn has_document(self) -> bool {
        matches!(self, ViewerState::Loaded | ViewerState::Shown)
    }
}

/// Notifications drained with [`super::TileViewer::poll_events`]
#[derive(Debug)]
pub enum ViewerEvent {
    LoadComplete { page_count: usize },
    LoadError(OpenError),
    PageRenderError { page: usize, error: PageError },
    /// A tile entered the cache
    TileRendered(Tile),
    /// Sent once per document, on the first tile of any kind
    FirstContentRendered { page_count: usize },
    PageChanged { page: usize, page_count: usize },
}
