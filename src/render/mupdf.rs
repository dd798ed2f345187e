//! MuPDF-backed rasterizer

use std::cell::RefCell;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, warn};
use lru::LruCache;
use mupdf::{Colorspace, Device, Document, IRect, Matrix, MetadataName, Page, Pixmap};

use crate::error::{OpenError, RasterFault};
use crate::layout::PageSize;
use crate::tiles::PixelBuffer;

use super::backend::{
    Bookmark, DocumentMeta, DocumentSource, PageLink, PageRect, PixelRect, RasterDocument,
    Rasterizer,
};

/// Loaded page handles kept per thread and document
const PAGE_HANDLES: NonZeroUsize = match NonZeroUsize::new(8) {
    Some(n) => n,
    None => unreachable!(),
};

static NEXT_DOCUMENT_ID: AtomicU64 = AtomicU64::new(1);

struct Handle {
    doc: Document,
    pages: LruCache<usize, Page>,
}

// MuPDF documents are bound to the thread that opened them
thread_local! {
    static HANDLES: RefCell<HashMap<u64, Handle>> = RefCell::new(HashMap::new());
}

fn open_mupdf(source: &DocumentSource, password: Option<&str>) -> Result<Document, OpenError> {
    let mut doc = match source {
        DocumentSource::Path(path) => {
            std::fs::metadata(path)?;
            Document::open(path.to_string_lossy().as_ref())
        }
        DocumentSource::Bytes(bytes) => Document::from_bytes(bytes, "application/pdf"),
    }
    .map_err(|e| OpenError::corrupt(e.to_string()))?;

    if doc
        .needs_password()
        .map_err(|e| OpenError::corrupt(e.to_string()))?
    {
        let authenticated = match password {
            Some(password) => doc
                .authenticate(password)
                .map_err(|e| OpenError::corrupt(e.to_string()))?,
            None => false,
        };
        if !authenticated {
            return Err(OpenError::WrongPassword);
        }
    }
    Ok(doc)
}

/// Opens PDF, XPS, CBZ and the other formats MuPDF understands
#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfRasterizer;

impl Rasterizer for MupdfRasterizer {
    fn open_document(
        &self,
        source: &DocumentSource,
        password: Option<&str>,
    ) -> Result<Box<dyn RasterDocument>, OpenError> {
        let doc = open_mupdf(source, password)?;
        let page_count = doc
            .page_count()
            .map_err(|e| OpenError::corrupt(e.to_string()))?;
        let id = NEXT_DOCUMENT_ID.fetch_add(1, Ordering::Relaxed);

        HANDLES.with(|handles| {
            handles.borrow_mut().insert(
                id,
                Handle {
                    doc,
                    pages: LruCache::new(PAGE_HANDLES),
                },
            );
        });

        Ok(Box::new(MupdfDocument {
            id,
            source: source.clone(),
            password: password.map(Arc::from),
            page_count: usize::try_from(page_count).unwrap_or(0),
        }))
    }
}

/// Document handle usable from any thread: each thread reopens the
/// source on first use.
pub struct MupdfDocument {
    id: u64,
    source: DocumentSource,
    password: Option<Arc<str>>,
    page_count: usize,
}

impl MupdfDocument {
    fn with_handle<T>(
        &self,
        f: impl FnOnce(&mut Handle) -> Result<T, RasterFault>,
    ) -> Result<T, RasterFault> {
        HANDLES.with(|handles| {
            let mut handles = handles.borrow_mut();
            if !handles.contains_key(&self.id) {
                debug!("Opening {} on worker thread", self.source.describe());
                let doc = open_mupdf(&self.source, self.password.as_deref())
                    .map_err(|e| RasterFault::generic(e.to_string()))?;
                handles.insert(
                    self.id,
                    Handle {
                        doc,
                        pages: LruCache::new(PAGE_HANDLES),
                    },
                );
            }
            let handle = handles
                .get_mut(&self.id)
                .ok_or_else(|| RasterFault::generic("document handle missing"))?;
            f(handle)
        })
    }

    fn with_page<T>(
        &self,
        page: usize,
        f: impl FnOnce(&Page) -> Result<T, RasterFault>,
    ) -> Result<T, RasterFault> {
        self.with_handle(|handle| {
            if !handle.pages.contains(&page) {
                let index = i32::try_from(page)
                    .map_err(|_| RasterFault::generic(format!("page {page} out of range")))?;
                let loaded = handle.doc.load_page(index)?;
                handle.pages.put(page, loaded);
            }
            let loaded = handle
                .pages
                .get(&page)
                .ok_or_else(|| RasterFault::generic(format!("page {page} not loaded")))?;
            f(loaded)
        })
    }
}

impl Drop for MupdfDocument {
    fn drop(&mut self) {
        let _ = HANDLES.try_with(|handles| {
            handles.borrow_mut().remove(&self.id);
        });
    }
}

fn copy_pixmap(pixmap: &Pixmap, target: &mut PixelBuffer) -> Result<(), RasterFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RasterFault::generic(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }
    let width = (pixmap.width() as usize).min(target.width() as usize);
    let height = (pixmap.height() as usize).min(target.height() as usize);
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();

    for y in 0..height {
        let row_start = y * stride;
        let Some(row) = samples.get(row_start..row_start + width * n) else {
            return Err(RasterFault::generic("Pixmap buffer size mismatch"));
        };
        for (x, px) in row.chunks_exact(n).enumerate() {
            target.put_rgb(x as u32, y as u32, [px[0], px[1], px[2]]);
        }
    }
    Ok(())
}

impl RasterDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn natural_page_size(&mut self, page: usize) -> Result<PageSize, RasterFault> {
        self.with_page(page, |p| {
            let bounds = p.bounds()?;
            Ok(PageSize::new(bounds.x1 - bounds.x0, bounds.y1 - bounds.y0))
        })
    }

    fn open_page(&mut self, page: usize) -> Result<(), RasterFault> {
        self.with_page(page, |_| Ok(()))
    }

    fn render_region(
        &mut self,
        page: usize,
        target: &mut PixelBuffer,
        rect: PixelRect,
        annotations: bool,
    ) -> Result<(), RasterFault> {
        self.with_page(page, |p| {
            let bounds = p.bounds()?;
            let page_width = bounds.x1 - bounds.x0;
            let page_height = bounds.y1 - bounds.y0;
            if page_width <= 0.0 || page_height <= 0.0 {
                return Err(RasterFault::generic(format!("page {page} has no area")));
            }

            let sx = rect.width as f32 / page_width;
            let sy = rect.height as f32 / page_height;
            let ctm = Matrix::new(
                sx,
                0.0,
                0.0,
                sy,
                rect.x as f32 - bounds.x0 * sx,
                rect.y as f32 - bounds.y0 * sy,
            );

            let area = IRect::new(0, 0, target.width() as i32, target.height() as i32);
            let mut pixmap = Pixmap::new_with_rect(&Colorspace::device_rgb(), area, false)?;
            pixmap.clear_with(0xFF)?;
            {
                let device = Device::from_pixmap(&pixmap)?;
                p.run_contents(&device, &ctm)?;
                if annotations {
                    p.run_annotations(&device, &ctm)?;
                    p.run_widgets(&device, &ctm)?;
                }
            }
            copy_pixmap(&pixmap, target)
        })
    }

    fn metadata(&mut self) -> DocumentMeta {
        let read = |doc: &Document, name: MetadataName| {
            doc.metadata(name).ok().filter(|value| !value.is_empty())
        };
        self.with_handle(|handle| {
            let doc = &handle.doc;
            Ok(DocumentMeta {
                title: read(doc, MetadataName::Title),
                author: read(doc, MetadataName::Author),
                subject: read(doc, MetadataName::Subject),
                keywords: read(doc, MetadataName::Keywords),
                creator: read(doc, MetadataName::Creator),
                producer: read(doc, MetadataName::Producer),
                creation_date: read(doc, MetadataName::CreationDate),
                mod_date: read(doc, MetadataName::ModDate),
            })
        })
        .unwrap_or_else(|e| {
            warn!("Failed to read document metadata: {e}");
            DocumentMeta::default()
        })
    }

    fn bookmarks(&mut self) -> Vec<Bookmark> {
        fn convert(outlines: &[mupdf::Outline]) -> Vec<Bookmark> {
            outlines
                .iter()
                .map(|outline| Bookmark {
                    title: outline.title.trim().to_string(),
                    page: outline
                        .dest
                        .as_ref()
                        .and_then(|dest| usize::try_from(dest.loc.page_number).ok()),
                    children: convert(&outline.down),
                })
                .collect()
        }

        self.with_handle(|handle| Ok(convert(&handle.doc.outlines()?)))
            .unwrap_or_else(|e| {
                warn!("Failed to read outlines: {e}");
                Vec::new()
            })
    }

    fn links(&mut self, page: usize) -> Vec<PageLink> {
        self.with_page(page, |p| {
            Ok(p.links()?
                .filter_map(|link| {
                    let rect = link.bounds;
                    if rect.is_empty() {
                        return None;
                    }
                    let dest_page = link
                        .dest
                        .as_ref()
                        .and_then(|dest| usize::try_from(dest.loc.page_number).ok());
                    let uri = (!link.uri.is_empty()).then(|| link.uri.clone());
                    if dest_page.is_none() && uri.is_none() {
                        return None;
                    }
                    Some(PageLink {
                        bounds: PageRect::new(
                            rect.x0.min(rect.x1),
                            rect.y0.min(rect.y1),
                            rect.x0.max(rect.x1),
                            rect.y0.max(rect.y1),
                        ),
                        dest_page,
                        uri,
                    })
                })
                .collect())
        })
        .unwrap_or_default()
    }

    fn close_page(&mut self, page: usize) {
        let _ = self.with_handle(|handle| {
            handle.pages.pop(&page);
            Ok(())
        });
    }
}
