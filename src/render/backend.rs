//! Rasterizer capability consumed by the pipeline

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{OpenError, RasterFault};
use crate::layout::PageSize;
use crate::tiles::PixelBuffer;

/// Where a document comes from
#[derive(Clone, Debug)]
pub enum DocumentSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl DocumentSource {
    /// Short description for logs
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            DocumentSource::Path(path) => path.display().to_string(),
            DocumentSource::Bytes(bytes) => format!("<{} bytes>", bytes.len()),
        }
    }
}

/// Integer rectangle in target buffer pixels; may extend past the buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Rectangle in page space (points, origin top-left) or device space
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PageRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl PageRect {
    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Document information dictionary
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DocumentMeta {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub keywords: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
    pub mod_date: Option<String>,
}

/// Outline entry with nested children
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bookmark {
    pub title: String,
    /// Target page (document index), if the entry points inside the document
    pub page: Option<usize>,
    pub children: Vec<Bookmark>,
}

/// Clickable area on a page
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PageLink {
    /// Area in page space
    pub bounds: PageRect,
    pub dest_page: Option<usize>,
    pub uri: Option<String>,
}

/// An opened document handle.
///
/// Implementations need not be re-entrant: every call is made while the
/// owning [`super::OpenedDocument`] holds its library lock.
pub trait RasterDocument: Send {
    fn page_count(&self) -> usize;

    /// Natural page size in points
    fn natural_page_size(&mut self, page: usize) -> Result<PageSize, RasterFault>;

    /// Prepare a page for rendering
    fn open_page(&mut self, page: usize) -> Result<(), RasterFault>;

    /// Paint the whole page scaled to `rect.width` x `rect.height`, placed at
    /// `(rect.x, rect.y)` in `target` and clipped to the buffer.
    fn render_region(
        &mut self,
        page: usize,
        target: &mut PixelBuffer,
        rect: PixelRect,
        annotations: bool,
    ) -> Result<(), RasterFault>;

    fn metadata(&mut self) -> DocumentMeta;

    fn bookmarks(&mut self) -> Vec<Bookmark>;

    fn links(&mut self, page: usize) -> Vec<PageLink>;

    /// Map a page space rectangle onto a device area of `size` pixels at `origin`
    fn map_rect_to_device(
        &mut self,
        page: usize,
        origin: (i32, i32),
        size: (i32, i32),
        rect: PageRect,
    ) -> PageRect {
        let natural = self.natural_page_size(page).unwrap_or_default();
        if natural.is_degenerate() {
            return PageRect::default();
        }
        let sx = size.0 as f32 / natural.width;
        let sy = size.1 as f32 / natural.height;
        let (ox, oy) = (origin.0 as f32, origin.1 as f32);
        PageRect::new(
            ox + rect.left * sx,
            oy + rect.top * sy,
            ox + rect.right * sx,
            oy + rect.bottom * sy,
        )
    }

    /// Release resources held for an opened page
    fn close_page(&mut self, _page: usize) {}
}

/// Factory for document handles
pub trait Rasterizer: Send + Sync {
    fn open_document(
        &self,
        source: &DocumentSource,
        password: Option<&str>,
    ) -> Result<Box<dyn RasterDocument>, OpenError>;
}
