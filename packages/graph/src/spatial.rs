//! Uniform-grid spatial hash over lon/lat extents.
//!
//! Each key is bucketed into every grid cell its extent touches. Keys whose
//! extent would span more than [`MAX_CELLS_PER_ENTRY`] cells (country
//! boundaries, long rivers) are kept in a side list that every query scans.
//! Keys with an empty extent are remembered but never returned.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use mapedit_osm::Extent;

pub const MAX_CELLS_PER_ENTRY: i64 = 64;

type Cell = (i64, i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRange {
    min: Cell,
    max: Cell,
}

impl CellRange {
    fn count(&self) -> i64 {
        (self.max.0 - self.min.0 + 1).saturating_mul(self.max.1 - self.min.1 + 1)
    }

    fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (self.min.0..=self.max.0).flat_map(move |x| (self.min.1..=self.max.1).map(move |y| (x, y)))
    }
}

#[derive(Debug, Clone)]
pub struct SpatialIndex<K> {
    cell_size: f64,
    cells: HashMap<Cell, HashSet<K>>,
    oversized: HashSet<K>,
    extents: HashMap<K, Extent>,
}

impl<K> SpatialIndex<K>
where
    K: Copy + Eq + Hash + Ord,
{
    pub fn new(cell_size: f64) -> Self {
        debug_assert!(cell_size > 0.0, "cell size must be positive");
        Self {
            cell_size,
            cells: HashMap::new(),
            oversized: HashSet::new(),
            extents: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.extents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }

    pub fn contains(&self, key: K) -> bool {
        self.extents.contains_key(&key)
    }

    pub fn extent(&self, key: K) -> Option<Extent> {
        self.extents.get(&key).copied()
    }

    fn cell_of(&self, value: f64) -> i64 {
        (value / self.cell_size).floor() as i64
    }

    fn range(&self, extent: &Extent) -> CellRange {
        CellRange {
            min: (self.cell_of(extent.min.lon), self.cell_of(extent.min.lat)),
            max: (self.cell_of(extent.max.lon), self.cell_of(extent.max.lat)),
        }
    }

    /// Insert or move `key`
    pub fn insert(&mut self, key: K, extent: Extent) {
        self.remove(key);
        self.extents.insert(key, extent);
        if extent.is_empty() {
            return;
        }

        let range = self.range(&extent);
        if range.count() > MAX_CELLS_PER_ENTRY {
            self.oversized.insert(key);
            return;
        }
        for cell in range.cells() {
            self.cells.entry(cell).or_default().insert(key);
        }
    }

    pub fn remove(&mut self, key: K) -> Option<Extent> {
        let extent = self.extents.remove(&key)?;
        if extent.is_empty() || self.oversized.remove(&key) {
            return Some(extent);
        }

        let range = self.range(&extent);
        for cell in range.cells() {
            if let Some(bucket) = self.cells.get_mut(&cell) {
                bucket.remove(&key);
                if bucket.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        Some(extent)
    }

    /// Keys whose extent overlaps `extent`, in key order
    pub fn query(&self, extent: &Extent) -> Vec<K> {
        if extent.is_empty() {
            return Vec::new();
        }

        let range = self.range(extent);
        let mut found: BTreeSet<K> = BTreeSet::new();

        if range.count() as usize > self.extents.len() {
            // cheaper to test every entry than to walk the cells
            found.extend(
                self.extents
                    .iter()
                    .filter(|(_, e)| e.intersects(extent))
                    .map(|(k, _)| *k),
            );
            return found.into_iter().collect();
        }

        for cell in range.cells() {
            if let Some(bucket) = self.cells.get(&cell) {
                found.extend(bucket.iter().copied().filter(|k| self.overlaps(*k, extent)));
            }
        }
        found.extend(self.oversized.iter().copied().filter(|k| self.overlaps(*k, extent)));
        found.into_iter().collect()
    }

    fn overlaps(&self, key: K, extent: &Extent) -> bool {
        self.extents.get(&key).is_some_and(|e| e.intersects(extent))
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.oversized.clear();
        self.extents.clear();
    }
}
