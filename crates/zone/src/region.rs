use crate::grid::GridPartition;
use serde::{Deserialize, Serialize};
use shardline_common::{EntityKey, Point, PublicId, RegionId};
use std::collections::{BTreeMap, BTreeSet};

/// Largest public id handed out; `u16::MAX` is reserved on the wire.
const MAX_PUBLIC_ID: u16 = u16::MAX - 1;

/// Errors from region membership changes.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ZoneError {
    #[error("region {0:?} is full ({1} visible entities)")]
    Full(RegionId, usize),
    #[error("region {0:?} is not hosted by this server")]
    Inactive(RegionId),
    #[error("entity {0:?} is already in the region")]
    AlreadyPresent(EntityKey),
}

/// Static description of a region, as found in the world configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSpec {
    pub id: u16,
    pub name: String,
    /// Width in tiles.
    pub width: u16,
    /// Height in tiles.
    pub height: u16,
    /// Maximum number of visible entities.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Whether this server process hosts the region.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_capacity() -> usize {
    MAX_PUBLIC_ID as usize
}

fn default_active() -> bool {
    true
}

/// A world region: which entities it holds, their public ids and their grid
/// placement.
#[derive(Debug, Clone)]
pub struct Region {
    id: RegionId,
    name: String,
    width: u16,
    height: u16,
    tile_size: i32,
    capacity: usize,
    active: bool,
    members: BTreeSet<EntityKey>,
    by_public: BTreeMap<PublicId, EntityKey>,
    by_key: BTreeMap<EntityKey, PublicId>,
    /// Next public id to try; rotates so freed ids are not reused at once.
    cursor: u16,
    grid: GridPartition,
}

impl Region {
    pub fn new(spec: &RegionSpec, tile_size: i32, cell_size: i32) -> Self {
        Self {
            id: RegionId(spec.id),
            name: spec.name.clone(),
            width: spec.width,
            height: spec.height,
            tile_size,
            capacity: spec.capacity.min(MAX_PUBLIC_ID as usize),
            active: spec.active,
            members: BTreeSet::new(),
            by_public: BTreeMap::new(),
            by_key: BTreeMap::new(),
            cursor: 1,
            grid: GridPartition::new(cell_size),
        }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cell_size(&self) -> i32 {
        self.grid.cell_size()
    }

    /// Whether a pixel position lies on one of the region's tiles.
    pub fn contains_point(&self, pos: Point) -> bool {
        pos.x >= 0
            && pos.y >= 0
            && pos.x / self.tile_size < i32::from(self.width)
            && pos.y / self.tile_size < i32::from(self.height)
    }

    /// Whether one more visible entity fits.
    pub fn has_room(&self) -> bool {
        self.by_key.len() < self.capacity
    }

    /// Adds an entity. Visible entities (`pos` given) receive a public id and
    /// a grid placement; non-visible ones are only recorded as members.
    pub fn insert(&mut self, key: EntityKey, pos: Option<Point>) -> Result<Option<PublicId>, ZoneError> {
        if !self.active {
            return Err(ZoneError::Inactive(self.id));
        }
        if self.members.contains(&key) {
            return Err(ZoneError::AlreadyPresent(key));
        }
        let Some(pos) = pos else {
            self.members.insert(key);
            return Ok(None);
        };
        let id = self.allocate().ok_or(ZoneError::Full(self.id, self.by_key.len()))?;
        self.members.insert(key);
        self.by_public.insert(id, key);
        self.by_key.insert(key, id);
        self.grid.place(key, pos);
        tracing::trace!(region = self.id.0, ?key, public_id = id.0, "entity placed");
        Ok(Some(id))
    }

    fn allocate(&mut self) -> Option<PublicId> {
        if !self.has_room() {
            return None;
        }
        for _ in 0..MAX_PUBLIC_ID {
            let candidate = PublicId(self.cursor);
            self.cursor = if self.cursor >= MAX_PUBLIC_ID { 1 } else { self.cursor + 1 };
            if !self.by_public.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Detaches an entity and frees its public id.
    pub fn remove(&mut self, key: EntityKey) -> Option<PublicId> {
        self.members.remove(&key);
        self.grid.remove(key);
        let id = self.by_key.remove(&key)?;
        self.by_public.remove(&id);
        Some(id)
    }

    /// Re-buckets moved entities after the movement phase of a tick.
    pub fn update_partition(&mut self, moved: impl IntoIterator<Item = (EntityKey, Point)>) {
        for (key, pos) in moved {
            if self.by_key.contains_key(&key) {
                self.grid.place(key, pos);
            }
        }
    }

    pub fn contains(&self, key: EntityKey) -> bool {
        self.members.contains(&key)
    }

    pub fn public_id(&self, key: EntityKey) -> Option<PublicId> {
        self.by_key.get(&key).copied()
    }

    pub fn entity(&self, id: PublicId) -> Option<EntityKey> {
        self.by_public.get(&id).copied()
    }

    /// Snapshot of every member, visible or not, in key order.
    pub fn everything(&self) -> Vec<EntityKey> {
        self.members.iter().copied().collect()
    }

    /// Candidate visible entities around the given positions.
    ///
    /// The query box spans all `centers`, grown by `radius` plus one cell so
    /// that entities which moved during the tick are still found.
    pub fn around(&self, centers: &[Point], radius: i32) -> Vec<EntityKey> {
        let Some(first) = centers.first() else {
            return Vec::new();
        };
        let (mut min, mut max) = (first.as_ivec2(), first.as_ivec2());
        for c in &centers[1..] {
            min = min.min(c.as_ivec2());
            max = max.max(c.as_ivec2());
        }
        let grow = radius + self.grid.cell_size();
        self.grid
            .entities_in_rect(Point::new(min.x - grow, min.y - grow), Point::new(max.x + grow, max.y + grow))
            .into_iter()
            .collect()
    }

    /// Number of members, visible or not.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Number of entities holding a public id.
    pub fn visible_count(&self) -> usize {
        self.by_key.len()
    }
}
