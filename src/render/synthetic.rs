//! Built-in rasterizer producing generated pages of fixed sizes

use crate::error::{OpenError, RasterFault};
use crate::layout::PageSize;
use crate::tiles::PixelBuffer;

use super::backend::{
    Bookmark, DocumentMeta, DocumentSource, PageLink, PageRect, PixelRect, RasterDocument,
    Rasterizer,
};

const CHECKER_POINTS: f32 = 50.0;
const BORDER_POINTS: f32 = 2.0;
const LINK_BAND: f32 = 0.1;

/// Rasterizer that ignores the source and draws a checkerboard per page
#[derive(Clone, Debug)]
pub struct SyntheticRasterizer {
    pages: Vec<PageSize>,
    password: Option<String>,
}

impl SyntheticRasterizer {
    #[must_use]
    pub fn new(pages: Vec<PageSize>) -> Self {
        Self {
            pages,
            password: None,
        }
    }

    /// Require `password` on open
    #[must_use]
    pub fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }
}

impl Rasterizer for SyntheticRasterizer {
    fn open_document(
        &self,
        _source: &DocumentSource,
        password: Option<&str>,
    ) -> Result<Box<dyn RasterDocument>, OpenError> {
        if let Some(expected) = &self.password {
            if password != Some(expected.as_str()) {
                return Err(OpenError::WrongPassword);
            }
        }
        Ok(Box::new(SyntheticDocument {
            pages: self.pages.clone(),
        }))
    }
}

/// Parse `WIDTHxHEIGHT` in points
pub fn parse_page_size(value: &str) -> Result<PageSize, String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: f32 = width
        .trim()
        .parse()
        .map_err(|e| format!("invalid width '{width}': {e}"))?;
    let height: f32 = height
        .trim()
        .parse()
        .map_err(|e| format!("invalid height '{height}': {e}"))?;
    if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
        return Err(format!("page size must be non-negative, got '{value}'"));
    }
    Ok(PageSize::new(width, height))
}

struct SyntheticDocument {
    pages: Vec<PageSize>,
}

impl SyntheticDocument {
    fn page(&self, page: usize) -> Result<PageSize, RasterFault> {
        self.pages
            .get(page)
            .copied()
            .ok_or_else(|| RasterFault::generic(format!("no page {page}")))
    }
}

fn page_tint(page: usize) -> [u8; 3] {
    const TINTS: [[u8; 3]; 4] = [
        [0x66, 0x99, 0xCC],
        [0xCC, 0x99, 0x66],
        [0x66, 0xCC, 0x99],
        [0x99, 0x66, 0xCC],
    ];
    TINTS[page % TINTS.len()]
}

/// Colour at a point in page space
fn sample(page: usize, size: PageSize, x: f32, y: f32) -> [u8; 3] {
    if x < BORDER_POINTS
        || y < BORDER_POINTS
        || x > size.width - BORDER_POINTS
        || y > size.height - BORDER_POINTS
    {
        return [0x20, 0x20, 0x20];
    }
    let cell = (x / CHECKER_POINTS) as i64 + (y / CHECKER_POINTS) as i64;
    if cell % 2 == 0 {
        page_tint(page)
    } else {
        [0xF0, 0xF0, 0xF0]
    }
}

impl RasterDocument for SyntheticDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn natural_page_size(&mut self, page: usize) -> Result<PageSize, RasterFault> {
        self.page(page)
    }

    fn open_page(&mut self, page: usize) -> Result<(), RasterFault> {
        let size = self.page(page)?;
        if size.is_degenerate() {
            return Err(RasterFault::generic(format!("page {page} has no area")));
        }
        Ok(())
    }

    fn render_region(
        &mut self,
        page: usize,
        target: &mut PixelBuffer,
        rect: PixelRect,
        _annotations: bool,
    ) -> Result<(), RasterFault> {
        let size = self.page(page)?;
        if rect.width == 0 || rect.height == 0 || size.is_degenerate() {
            return Ok(());
        }
        let scale_x = size.width / rect.width as f32;
        let scale_y = size.height / rect.height as f32;

        for by in 0..target.height() {
            let py = (by as i64 - i64::from(rect.y)) as f32 + 0.5;
            if py < 0.0 || py >= rect.height as f32 {
                continue;
            }
            for bx in 0..target.width() {
                let px = (bx as i64 - i64::from(rect.x)) as f32 + 0.5;
                if px < 0.0 || px >= rect.width as f32 {
                    continue;
                }
                target.put_rgb(bx, by, sample(page, size, px * scale_x, py * scale_y));
            }
        }
        Ok(())
    }

    fn metadata(&mut self) -> DocumentMeta {
        DocumentMeta {
            title: Some("Synthetic document".to_string()),
            producer: Some(env!("CARGO_PKG_NAME").to_string()),
            ..DocumentMeta::default()
        }
    }

    fn bookmarks(&mut self) -> Vec<Bookmark> {
        (0..self.pages.len())
            .map(|page| Bookmark {
                title: format!("Page {}", page + 1),
                page: Some(page),
                children: Vec::new(),
            })
            .collect()
    }

    fn links(&mut self, page: usize) -> Vec<PageLink> {
        let Ok(size) = self.page(page) else {
            return Vec::new();
        };
        if page + 1 >= self.pages.len() {
            return Vec::new();
        }
        vec![PageLink {
            bounds: PageRect::new(0.0, 0.0, size.width, size.height * LINK_BAND),
            dest_page: Some(page + 1),
            uri: None,
        }]
    }
}
