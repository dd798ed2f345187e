//! Two-generation tile cache with a separate thumbnail store

use std::sync::{Mutex, PoisonError};

use super::ordered::OrderedTileSet;
use super::thumbnails::ThumbnailStore;
use super::types::{Tile, TileBounds, TileKey};

/// Default number of high resolution tiles kept in memory
pub const DEFAULT_CACHE_SIZE: usize = 120;

/// Default number of whole-page thumbnails kept in memory
pub const DEFAULT_THUMBNAIL_CACHE_SIZE: usize = 8;

/// Outcome of [`TileCache::promote_if_contained`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    /// Found in the passive generation and moved to active
    Promoted,
    /// Already in the active generation
    Active,
    Absent,
}

impl Lookup {
    #[must_use]
    pub fn is_present(self) -> bool {
        self != Lookup::Absent
    }
}

#[derive(Debug, Default)]
struct Generations {
    /// Tiles requested by the current pass
    active: OrderedTileSet,
    /// Tiles from earlier passes, evicted first
    passive: OrderedTileSet,
}

impl Generations {
    fn len(&self) -> usize {
        self.active.len() + self.passive.len()
    }

    fn remove(&mut self, key: &TileKey) -> Option<Tile> {
        self.passive.remove(key).or_else(|| self.active.remove(key))
    }
}

/// Bounded store of rendered tiles.
///
/// Both generations live under one mutex so a swap is never observed half
/// done; thumbnails have their own lock.
#[derive(Debug)]
pub struct TileCache {
    generations: Mutex<Generations>,
    thumbnails: Mutex<ThumbnailStore>,
    capacity: usize,
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE, DEFAULT_THUMBNAIL_CACHE_SIZE)
    }
}

impl TileCache {
    #[must_use]
    pub fn new(capacity: usize, thumbnail_capacity: usize) -> Self {
        Self {
            generations: Mutex::new(Generations::default()),
            thumbnails: Mutex::new(ThumbnailStore::new(thumbnail_capacity)),
            capacity: capacity.max(1),
        }
    }

    /// Store a rendered tile in the active generation, evicting the lowest
    /// load orders (passive first) to stay within capacity. Returns the
    /// number of evicted tiles.
    pub fn insert(&self, tile: Tile) -> usize {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        generations.remove(&tile.key());

        let mut evicted = 0;
        while generations.len() >= self.capacity {
            let victim = match generations.passive.pop_first() {
                Some(tile) => Some(tile),
                None => generations.active.pop_first(),
            };
            if victim.is_none() {
                break;
            }
            evicted += 1;
        }

        generations.active.insert(tile);
        evicted
    }

    /// Start a new pass: everything in active joins passive
    pub fn swap_generations(&self) {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let Generations { active, passive } = &mut *generations;
        passive.append(active);
    }

    /// Look a tile up by identity. A passive hit is moved to active under
    /// `load_order`; an active hit is left untouched.
    pub fn promote_if_contained(&self, page: usize, bounds: &TileBounds, load_order: u64) -> Lookup {
        let key = TileKey::new(page, bounds);
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(mut tile) = generations.passive.remove(&key) {
            tile.load_order = load_order;
            generations.active.insert(tile);
            return Lookup::Promoted;
        }

        if generations.active.contains(&key) {
            Lookup::Active
        } else {
            Lookup::Absent
        }
    }

    pub fn insert_thumbnail(&self, tile: Tile) {
        self.thumbnails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tile);
    }

    #[must_use]
    pub fn contains_thumbnail(&self, page: usize, bounds: &TileBounds) -> bool {
        self.thumbnails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(page, bounds)
    }

    /// High resolution tiles in draw order: passive then active, each by load order
    #[must_use]
    pub fn tiles(&self) -> Vec<Tile> {
        let generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        generations
            .passive
            .iter()
            .chain(generations.active.iter())
            .cloned()
            .collect()
    }

    /// Thumbnails in insertion order
    #[must_use]
    pub fn thumbnails(&self) -> Vec<Tile> {
        self.thumbnails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Release every tile and thumbnail
    pub fn clear(&self) {
        {
            let mut generations = self
                .generations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            generations.active.clear();
            generations.passive.clear();
        }
        self.thumbnails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Tiles across both generations
    #[must_use]
    pub fn len(&self) -> usize {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn active_len(&self) -> usize {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .len()
    }

    #[must_use]
    pub fn passive_len(&self) -> usize {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .passive
            .len()
    }

    #[must_use]
    pub fn active_contains(&self, page: usize, bounds: &TileBounds) -> bool {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .contains(&TileKey::new(page, bounds))
    }

    #[must_use]
    pub fn passive_contains(&self, page: usize, bounds: &TileBounds) -> bool {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .passive
            .contains(&TileKey::new(page, bounds))
    }

    #[must_use]
    pub fn thumbnail_len(&self) -> usize {
        self.thumbnails
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
