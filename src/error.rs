//! Error taxonomy for the tile pipeline

/// Fatal failure while opening a document
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OpenError {
    #[error("incorrect password")]
    WrongPassword,

    #[error("corrupt document: {detail}")]
    Corrupt { detail: String },

    #[error("I/O failure: {detail}")]
    Io { detail: String },
}

impl OpenError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt { detail: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io { detail: msg.into() }
    }
}

impl From<std::io::Error> for OpenError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// A single page could not be opened. Cached per page and replayed on every
/// later request for that page.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("page {page} failed to open: {detail}")]
pub struct PageError {
    pub page: usize,
    pub detail: String,
}

impl PageError {
    pub fn new(page: usize, detail: impl Into<String>) -> Self {
        Self {
            page,
            detail: detail.into(),
        }
    }
}

/// Errors reported by a rasterizer backend
#[derive(Debug, thiserror::Error)]
pub enum RasterFault {
    #[cfg(feature = "mupdf")]
    #[error("PDF engine: {0}")]
    Mupdf(#[from] mupdf::error::Error),

    #[error("{detail}")]
    Generic { detail: String },
}

impl RasterFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Pixel buffer could not be allocated
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot allocate {width}x{height} pixel buffer")]
pub struct AllocError {
    pub width: u32,
    pub height: u32,
}

/// Misuse of the viewer API
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ViewerError {
    #[error("viewer must be recycled before loading another document")]
    NotRecycled,

    #[error("no document is loaded")]
    NoDocument,
}
