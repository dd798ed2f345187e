//! Tile, bounds and pixel buffer types

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AllocError;

/// Page-relative rectangle, each edge in `0.0..=1.0`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TileBounds {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl TileBounds {
    /// Bounds covering the whole page, used by thumbnails
    pub const FULL_PAGE: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    #[must_use]
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    fn bits(&self) -> [u32; 4] {
        [
            self.left.to_bits(),
            self.top.to_bits(),
            self.right.to_bits(),
            self.bottom.to_bits(),
        ]
    }
}

/// Hashable identity of a tile: page plus bit-exact bounds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub page: usize,
    bounds: [u32; 4],
}

impl TileKey {
    #[must_use]
    pub fn new(page: usize, bounds: &TileBounds) -> Self {
        Self {
            page,
            bounds: bounds.bits(),
        }
    }
}

/// Pixel layout of rendered tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 16-bit 5-6-5, little endian
    #[default]
    Rgb565,
    /// 32-bit RGBA
    Rgba8888,
}

impl PixelFormat {
    #[must_use]
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb565 => 2,
            PixelFormat::Rgba8888 => 4,
        }
    }
}

/// Owned pixel storage for one rendered tile
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl PixelBuffer {
    /// Allocate a white buffer. Fails instead of aborting when the size is
    /// empty, above `max_pixels`, or the allocator refuses the request.
    pub fn try_new(
        width: u32,
        height: u32,
        format: PixelFormat,
        max_pixels: u64,
    ) -> Result<Self, AllocError> {
        let err = AllocError { width, height };
        let count = u64::from(width) * u64::from(height);
        if count == 0 || count > max_pixels {
            return Err(err);
        }

        let len = usize::try_from(count)
            .ok()
            .and_then(|c| c.checked_mul(format.bytes_per_pixel()))
            .ok_or(err)?;

        let mut pixels = Vec::new();
        pixels.try_reserve_exact(len).map_err(|_| err)?;
        pixels.resize(len, 0xFF);

        Ok(Self {
            pixels,
            width,
            height,
            format,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row
    #[must_use]
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Write one pixel from RGB components; out of range coordinates are ignored
    pub fn put_rgb(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let bpp = self.format.bytes_per_pixel();
        let idx = y as usize * self.stride() + x as usize * bpp;
        match self.format {
            PixelFormat::Rgb565 => {
                let packed = (u16::from(rgb[0] >> 3) << 11)
                    | (u16::from(rgb[1] >> 2) << 5)
                    | u16::from(rgb[2] >> 3);
                self.pixels[idx..idx + 2].copy_from_slice(&packed.to_le_bytes());
            }
            PixelFormat::Rgba8888 => {
                self.pixels[idx..idx + 4].copy_from_slice(&[rgb[0], rgb[1], rgb[2], 0xFF]);
            }
        }
    }

    /// Read one pixel as RGB, expanding 565 samples to 8 bits
    #[must_use]
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let bpp = self.format.bytes_per_pixel();
        let idx = y as usize * self.stride() + x as usize * bpp;
        match self.format {
            PixelFormat::Rgb565 => {
                let packed = u16::from_le_bytes([self.pixels[idx], self.pixels[idx + 1]]);
                let r = ((packed >> 11) & 0x1F) as u8;
                let g = ((packed >> 5) & 0x3F) as u8;
                let b = (packed & 0x1F) as u8;
                Some([(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)])
            }
            PixelFormat::Rgba8888 => Some([
                self.pixels[idx],
                self.pixels[idx + 1],
                self.pixels[idx + 2],
            ]),
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// A rendered slice of one page.
///
/// Two tiles are the same tile when they cover the same page and the same
/// bit-exact bounds; the load order and pass are bookkeeping only.
#[derive(Clone, Debug)]
pub struct Tile {
    /// Page index (0-indexed)
    pub page: usize,
    /// Page-relative region covered by the pixels
    pub bounds: TileBounds,
    /// Whole-page low resolution variant
    pub thumbnail: bool,
    /// Cache priority assigned when the tile was requested
    pub load_order: u64,
    /// Planner pass that requested the tile
    pub pass: u64,
    pub pixels: Arc<PixelBuffer>,
}

impl Tile {
    #[must_use]
    pub fn key(&self) -> TileKey {
        TileKey::new(self.page, &self.bounds)
    }

    #[must_use]
    pub fn matches(&self, page: usize, bounds: &TileBounds) -> bool {
        self.page == page && self.bounds == *bounds
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other.page, &other.bounds)
    }
}
