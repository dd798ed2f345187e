//! Opened document with page subset mapping and an open-once page table

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use log::{debug, warn};

use crate::error::{PageError, RasterFault};
use crate::layout::PageSize;
use crate::tiles::PixelBuffer;

use super::backend::{Bookmark, DocumentMeta, PageLink, PageRect, PixelRect, RasterDocument};

struct Library {
    handle: Box<dyn RasterDocument>,
    /// Document page -> outcome of the first open attempt
    opened: HashMap<usize, Result<(), PageError>>,
}

/// Thread-safe wrapper around a [`RasterDocument`].
///
/// Every backend call, page-table lookup included, happens under one lock,
/// which is never held while calling back into other locked structures.
pub struct OpenedDocument {
    library: Mutex<Library>,
    user_pages: Option<Vec<usize>>,
    document_pages: usize,
}

impl OpenedDocument {
    /// Wrap a handle. `user_pages` lists document pages in display order;
    /// duplicates and arbitrary order are allowed.
    #[must_use]
    pub fn new(handle: Box<dyn RasterDocument>, user_pages: Option<Vec<usize>>) -> Self {
        let document_pages = handle.page_count();
        Self {
            library: Mutex::new(Library {
                handle,
                opened: HashMap::new(),
            }),
            user_pages,
            document_pages,
        }
    }

    /// Number of view pages
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.user_pages
            .as_ref()
            .map_or(self.document_pages, Vec::len)
    }

    /// Document page shown at view page `page`, if it exists
    #[must_use]
    pub fn document_page(&self, page: usize) -> Option<usize> {
        let doc_page = match &self.user_pages {
            Some(pages) => *pages.get(page)?,
            None => page,
        };
        (doc_page < self.document_pages).then_some(doc_page)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Library> {
        self.library.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Natural sizes per view page; pages outside the document are zero sized
    #[must_use]
    pub fn natural_page_sizes(&self) -> Vec<PageSize> {
        let pages: Vec<_> = (0..self.page_count())
            .map(|page| self.document_page(page))
            .collect();

        let mut library = self.lock();
        pages
            .into_iter()
            .enumerate()
            .map(|(page, doc_page)| {
                let Some(doc_page) = doc_page else {
                    return PageSize::zero();
                };
                library
                    .handle
                    .natural_page_size(doc_page)
                    .unwrap_or_else(|e| {
                        warn!("Failed to read size of page {page}: {e}");
                        PageSize::zero()
                    })
            })
            .collect()
    }

    #[must_use]
    pub fn natural_page_size(&self, page: usize) -> PageSize {
        let Some(doc_page) = self.document_page(page) else {
            return PageSize::zero();
        };
        self.lock()
            .handle
            .natural_page_size(doc_page)
            .unwrap_or_default()
    }

    /// Open a page once. Returns `Ok(true)` when this call opened it and
    /// `Ok(false)` when it was already open; an earlier failure is replayed
    /// without touching the backend again.
    pub fn open_page(&self, page: usize) -> Result<bool, PageError> {
        let Some(doc_page) = self.document_page(page) else {
            return Err(PageError::new(page, "page is outside the document"));
        };

        let mut library = self.lock();
        if let Some(outcome) = library.opened.get(&doc_page) {
            return outcome.clone().map(|()| false);
        }

        match library.handle.open_page(doc_page) {
            Ok(()) => {
                library.opened.insert(doc_page, Ok(()));
                Ok(true)
            }
            Err(e) => {
                debug!("Page {page} (document page {doc_page}) failed to open: {e}");
                let error = PageError::new(page, e.to_string());
                library.opened.insert(doc_page, Err(error.clone()));
                Err(error)
            }
        }
    }

    /// True unless the page has been opened successfully
    #[must_use]
    pub fn page_has_error(&self, page: usize) -> bool {
        let Some(doc_page) = self.document_page(page) else {
            return true;
        };
        !matches!(self.lock().opened.get(&doc_page), Some(Ok(())))
    }

    pub fn render_region(
        &self,
        page: usize,
        target: &mut PixelBuffer,
        rect: PixelRect,
        annotations: bool,
    ) -> Result<(), RasterFault> {
        let doc_page = self
            .document_page(page)
            .ok_or_else(|| RasterFault::generic(format!("page {page} is outside the document")))?;
        self.lock()
            .handle
            .render_region(doc_page, target, rect, annotations)
    }

    #[must_use]
    pub fn metadata(&self) -> DocumentMeta {
        self.lock().handle.metadata()
    }

    #[must_use]
    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.lock().handle.bookmarks()
    }

    #[must_use]
    pub fn links(&self, page: usize) -> Vec<PageLink> {
        match self.document_page(page) {
            Some(doc_page) => self.lock().handle.links(doc_page),
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn map_rect_to_device(
        &self,
        page: usize,
        origin: (i32, i32),
        size: (i32, i32),
        rect: PageRect,
    ) -> PageRect {
        match self.document_page(page) {
            Some(doc_page) => self
                .lock()
                .handle
                .map_rect_to_device(doc_page, origin, size, rect),
            None => PageRect::default(),
        }
    }
}

impl Drop for OpenedDocument {
    fn drop(&mut self) {
        let library = self
            .library
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        let opened: Vec<_> = library
            .opened
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(page, _)| *page)
            .collect();
        for page in opened {
            library.handle.close_page(page);
        }
    }
}
