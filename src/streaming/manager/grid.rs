// src/streaming/manager/grid.rs
use rustc_hash::FxHashMap as HashMap;

use crate::config::TerrainConfig;
use crate::streaming::types::*;

use super::keep;

/// Per-offset detail levels. Fixed for a given config; rebuilt on reset.
#[derive(Debug, Default)]
pub struct LodTable {
    entries: HashMap<GridOffset, LodEntry>,
}

impl LodTable {
    pub fn build(cfg: &TerrainConfig) -> Self {
        let rd = cfg.render_distance;
        let limit = cfg.lod_limit();
        let origin = ChunkCoord::default();

        let mut entries = HashMap::default();
        for z in -rd..=rd {
            for x in -rd..=rd {
                let off = GridOffset::new(x, z);
                if keep::in_range(origin, origin.offset(off), cfg) {
                    entries.insert(off, LodEntry::new(x, z, limit));
                }
            }
        }
        Self { entries }
    }

    #[inline]
    pub fn get(&self, off: GridOffset) -> Option<&LodEntry> {
        self.entries.get(&off)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GridOffset, LodEntry)> + '_ {
        self.entries.iter().map(|(o, l)| (*o, *l))
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MeshSlot {
    pub lod: LodEntry,
    /// Chunk whose field the slot currently shows.
    pub chunk: Option<ChunkCoord>,
    pub visible: bool,
}

/// One mesh slot per in-range grid offset.
#[derive(Debug, Default)]
pub struct MeshGrid {
    slots: HashMap<GridOffset, MeshSlot>,
}

impl MeshGrid {
    pub fn from_table(table: &LodTable) -> Self {
        let slots = table
            .iter()
            .map(|(off, lod)| (off, MeshSlot { lod, chunk: None, visible: false }))
            .collect();
        Self { slots }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn get(&self, off: GridOffset) -> Option<&MeshSlot> {
        self.slots.get(&off)
    }

    #[inline]
    pub fn get_mut(&mut self, off: GridOffset) -> Option<&mut MeshSlot> {
        self.slots.get_mut(&off)
    }

    pub fn offsets(&self) -> impl Iterator<Item = GridOffset> + '_ {
        self.slots.keys().copied()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (GridOffset, &mut MeshSlot)> + '_ {
        self.slots.iter_mut().map(|(o, s)| (*o, s))
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_range_and_lod_rules() {
        let cfg = TerrainConfig { render_distance: 2, ..Default::default() };
        let t = LodTable::build(&cfg);
        assert_eq!(t.len(), 9);
        assert!(t.get(GridOffset::new(2, 0)).is_none());

        let corner = t.get(GridOffset::new(-1, 1)).unwrap();
        assert_eq!(*corner, LodEntry::new(-1, 1, cfg.lod_limit()));
        assert_eq!(corner.center, 1);
        assert_eq!(corner.west, 1);
        assert_eq!(corner.east, 2);
    }

    #[test]
    fn slots_start_empty_and_hidden() {
        let cfg = TerrainConfig { render_distance: 3, ..Default::default() };
        let grid = MeshGrid::from_table(&LodTable::build(&cfg));
        assert_eq!(grid.len(), LodTable::build(&cfg).len());
        for off in grid.offsets() {
            let s = grid.get(off).unwrap();
            assert!(s.chunk.is_none());
            assert!(!s.visible);
        }
    }
}
