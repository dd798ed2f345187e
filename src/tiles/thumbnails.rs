//! Bounded FIFO of whole-page thumbnails

use std::collections::VecDeque;

use super::types::{Tile, TileBounds};

/// Thumbnails in insertion order; the oldest is dropped on overflow
#[derive(Debug)]
pub struct ThumbnailStore {
    tiles: VecDeque<Tile>,
    capacity: usize,
}

impl ThumbnailStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tiles: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Append a thumbnail, evicting the oldest ones past capacity.
    /// Returns the number of evicted thumbnails.
    pub fn insert(&mut self, tile: Tile) -> usize {
        let mut evicted = 0;
        while self.tiles.len() >= self.capacity {
            self.tiles.pop_front();
            evicted += 1;
        }
        self.tiles.push_back(tile);
        evicted
    }

    /// Linear scan; the store is small
    #[must_use]
    pub fn contains(&self, page: usize, bounds: &TileBounds) -> bool {
        self.tiles.iter().any(|t| t.matches(page, bounds))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::types::{PixelBuffer, PixelFormat};
    use super::*;

    fn thumb(page: usize) -> Tile {
        Tile {
            page,
            bounds: TileBounds::FULL_PAGE,
            thumbnail: true,
            load_order: 0,
            pass: 1,
            pixels: Arc::new(PixelBuffer::try_new(1, 1, PixelFormat::Rgb565, 1).expect("alloc")),
        }
    }

    #[test]
    fn thumbnails_evict_fifo() {
        let mut store = ThumbnailStore::new(2);
        assert_eq!(store.insert(thumb(0)), 0);
        assert_eq!(store.insert(thumb(1)), 0);
        assert_eq!(store.insert(thumb(2)), 1);

        assert!(!store.contains(0, &TileBounds::FULL_PAGE));
        assert!(store.contains(1, &TileBounds::FULL_PAGE));
        assert!(store.contains(2, &TileBounds::FULL_PAGE));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn thumbnails_match_exact_bounds() {
        let mut store = ThumbnailStore::new(4);
        store.insert(thumb(3));
        assert!(!store.contains(3, &TileBounds::new(0.0, 0.0, 1.0, 0.5)));
        store.clear();
        assert!(store.is_empty());
    }
}
