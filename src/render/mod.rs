//! Rasterization: backends, the opened document, the open task and the tile worker

mod backend;
mod document;
mod open_task;
mod request;
pub mod synthetic;
mod worker;

#[cfg(feature = "mupdf")]
pub mod mupdf;

pub use backend::{
    Bookmark, DocumentMeta, DocumentSource, PageLink, PageRect, PixelRect, RasterDocument,
    Rasterizer,
};
pub use document::OpenedDocument;
pub use open_task::{DocumentOpenTask, LoadedDocument, OpenReport, OpenRequest, open_document};
pub use request::{RenderResponse, RequestId, TileRequest, render_rect};
pub use worker::{DEFAULT_MAX_TILE_PIXELS, RenderWorker, render_tile};
