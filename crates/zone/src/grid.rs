use shardline_common::{EntityKey, Point};
use std::collections::{BTreeMap, BTreeSet};

/// A 2D cell coordinate in the region grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

impl CellCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Fixed-size grid partitioning of a region.
///
/// Entities are assigned to cells by their pixel position divided by
/// `cell_size`. BTree collections keep query results in a stable order, so the
/// messages built from them are reproducible.
#[derive(Debug, Clone)]
pub struct GridPartition {
    cell_size: i32,
    cells: BTreeMap<CellCoord, BTreeSet<EntityKey>>,
    placements: BTreeMap<EntityKey, CellCoord>,
}

impl GridPartition {
    /// Create a new grid partition with the given cell size in pixels.
    pub fn new(cell_size: i32) -> Self {
        assert!(cell_size > 0, "cell_size must be positive");
        Self {
            cell_size,
            cells: BTreeMap::new(),
            placements: BTreeMap::new(),
        }
    }

    pub fn cell_size(&self) -> i32 {
        self.cell_size
    }

    /// Convert a pixel position to a cell coordinate.
    pub fn position_to_cell(&self, pos: Point) -> CellCoord {
        CellCoord {
            x: pos.x.div_euclid(self.cell_size),
            y: pos.y.div_euclid(self.cell_size),
        }
    }

    /// Place an entity, moving it if it was already placed elsewhere.
    pub fn place(&mut self, key: EntityKey, pos: Point) {
        let coord = self.position_to_cell(pos);
        match self.placements.insert(key, coord) {
            Some(old) if old == coord => return,
            Some(old) => self.detach(key, old),
            None => {}
        }
        self.cells.entry(coord).or_default().insert(key);
    }

    /// Forget an entity. Returns whether it was placed.
    pub fn remove(&mut self, key: EntityKey) -> bool {
        match self.placements.remove(&key) {
            Some(coord) => {
                self.detach(key, coord);
                true
            }
            None => false,
        }
    }

    fn detach(&mut self, key: EntityKey, coord: CellCoord) {
        if let Some(set) = self.cells.get_mut(&coord) {
            set.remove(&key);
            if set.is_empty() {
                self.cells.remove(&coord);
            }
        }
    }

    /// Cell currently holding an entity.
    pub fn cell_of(&self, key: EntityKey) -> Option<CellCoord> {
        self.placements.get(&key).copied()
    }

    /// Get all entities in a specific cell.
    pub fn entities_in_cell(&self, coord: CellCoord) -> BTreeSet<EntityKey> {
        self.cells.get(&coord).cloned().unwrap_or_default()
    }

    /// All entities whose cell intersects the pixel rectangle `[min, max]`.
    pub fn entities_in_rect(&self, min: Point, max: Point) -> BTreeSet<EntityKey> {
        let lo = self.position_to_cell(min);
        let hi = self.position_to_cell(max);
        let mut result = BTreeSet::new();
        for (_, entities) in self
            .cells
            .range(CellCoord::new(lo.x, i32::MIN)..=CellCoord::new(hi.x, i32::MAX))
            .filter(|(c, _)| c.y >= lo.y && c.y <= hi.y)
        {
            result.extend(entities);
        }
        result
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Total number of entity placements across all cells.
    pub fn total_placements(&self) -> usize {
        self.placements.len()
    }
}
