//! Tiles ordered by load order with keyed removal

use std::collections::{BTreeMap, HashMap};

use super::types::{Tile, TileKey};

type Slot = (u64, u64);

/// Ordered set of tiles.
///
/// Entries are sorted by `(load_order, insertion sequence)` so ties keep
/// their arrival order. A side index maps tile identity to its slot, which
/// makes removal of an arbitrary tile `O(log n)`.
#[derive(Debug, Default)]
pub struct OrderedTileSet {
    entries: BTreeMap<Slot, Tile>,
    index: HashMap<TileKey, Slot>,
    next_seq: u64,
}

impl OrderedTileSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tile, replacing and returning any tile with the same identity
    pub fn insert(&mut self, tile: Tile) -> Option<Tile> {
        let key = tile.key();
        let previous = self.remove(&key);

        let slot = (tile.load_order, self.next_seq);
        self.next_seq += 1;
        self.index.insert(key, slot);
        self.entries.insert(slot, tile);

        previous
    }

    /// Remove the tile with the smallest load order
    pub fn pop_first(&mut self) -> Option<Tile> {
        let (_, tile) = self.entries.pop_first()?;
        self.index.remove(&tile.key());
        Some(tile)
    }

    pub fn remove(&mut self, key: &TileKey) -> Option<Tile> {
        let slot = self.index.remove(key)?;
        self.entries.remove(&slot)
    }

    #[must_use]
    pub fn contains(&self, key: &TileKey) -> bool {
        self.index.contains_key(key)
    }

    #[must_use]
    pub fn get(&self, key: &TileKey) -> Option<&Tile> {
        self.index.get(key).and_then(|slot| self.entries.get(slot))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Smallest load order currently stored
    #[must_use]
    pub fn first_order(&self) -> Option<u64> {
        self.entries.keys().next().map(|(order, _)| *order)
    }

    /// Tiles in ascending load order
    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.entries.values()
    }

    /// Move every tile of `other` into `self`, leaving `other` empty
    pub fn append(&mut self, other: &mut OrderedTileSet) {
        other.index.clear();
        for (_, tile) in std::mem::take(&mut other.entries) {
            self.insert(tile);
        }
    }

    /// Drop every tile, releasing its pixels
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
