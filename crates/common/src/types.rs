use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::ops::BitOr;

slotmap::new_key_type! {
    /// Arena handle of an entity, valid from creation until destruction.
    pub struct EntityKey;
}

/// Identifier of an entity inside its region, as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicId(pub u16);

/// Identifier of a region (map) of the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u16);

/// Database identifier of an item class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u16);

/// Pixel position inside a region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn as_ivec2(self) -> IVec2 {
        IVec2::new(self.x, self.y)
    }

    /// Square-area proximity test: both axes within `radius` pixels.
    pub fn in_range_of(self, other: Point, radius: i32) -> bool {
        (self.as_ivec2() - other.as_ivec2()).abs().max_element() <= radius
    }

    /// Moves at most `speed` pixels per axis toward `target`.
    pub fn step_towards(self, target: Point, speed: i32) -> Point {
        let limit = IVec2::splat(speed.max(0));
        let delta = (target.as_ivec2() - self.as_ivec2()).clamp(-limit, limit);
        (self.as_ivec2() + delta).into()
    }
}

impl From<IVec2> for Point {
    fn from(v: IVec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Closed set of entity kinds known to the server.
///
/// `SpawnArea` is the only kind without spatial presence: it never gets a
/// public id and is never reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Item,
    Npc,
    Monster,
    Character,
    SpawnArea,
}

impl EntityKind {
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Item => 0,
            Self::Npc => 2,
            Self::Monster => 3,
            Self::Character => 4,
            Self::SpawnArea => 5,
        }
    }

    pub fn is_visible(self) -> bool {
        !matches!(self, Self::SpawnArea)
    }

    pub fn can_move(self) -> bool {
        matches!(self, Self::Npc | Self::Monster | Self::Character)
    }

    pub fn can_fight(self) -> bool {
        matches!(self, Self::Monster | Self::Character)
    }

    pub fn is_observer(self) -> bool {
        matches!(self, Self::Character)
    }
}

/// Facing of a being.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Up => 1,
            Self::Down => 2,
            Self::Left => 4,
            Self::Right => 8,
        }
    }

    /// Dominant-axis facing from `from` toward `to`, if they differ.
    pub fn between(from: Point, to: Point) -> Option<Self> {
        let d = to.as_ivec2() - from.as_ivec2();
        if d == IVec2::ZERO {
            None
        } else if d.x.abs() >= d.y.abs() {
            Some(if d.x > 0 { Self::Right } else { Self::Left })
        } else {
            Some(if d.y > 0 { Self::Down } else { Self::Up })
        }
    }
}

/// Current activity of a being.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[default]
    Stand,
    Walk,
    Attack,
    Sit,
    Dead,
    Hurt,
}

impl Action {
    pub fn wire_code(self) -> u8 {
        match self {
            Self::Stand => 0,
            Self::Walk => 1,
            Self::Attack => 2,
            Self::Sit => 3,
            Self::Dead => 4,
            Self::Hurt => 5,
        }
    }
}

/// Per-tick change bits of an entity, cleared by the tick orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct UpdateFlags(u8);

impl UpdateFlags {
    pub const NEW_ON_MAP: Self = Self(1 << 0);
    pub const ATTACK: Self = Self(1 << 1);
    pub const ACTION_CHANGE: Self = Self(1 << 2);
    pub const LOOKS_CHANGE: Self = Self(1 << 3);
    pub const DIR_CHANGE: Self = Self(1 << 4);
    pub const NEW_DESTINATION: Self = Self(1 << 5);
    pub const REMOVE: Self = Self(1 << 6);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when any bit of `other` is set.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

impl BitOr for UpdateFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_square_and_inclusive() {
        let p = Point::new(100, 100);
        assert!(p.in_range_of(Point::new(420, 420), 320));
        assert!(!p.in_range_of(Point::new(421, 100), 320));
        assert!(!p.in_range_of(Point::new(100, -221), 320));
    }

    #[test]
    fn step_towards_clamps_each_axis() {
        let p = Point::new(0, 0);
        assert_eq!(p.step_towards(Point::new(100, 3), 10), Point::new(10, 3));
        assert_eq!(p.step_towards(Point::new(-5, -50), 10), Point::new(-5, -10));
        assert_eq!(p.step_towards(Point::new(7, 7), 0), p);
    }

    #[test]
    fn direction_follows_dominant_axis() {
        let o = Point::new(0, 0);
        assert_eq!(Direction::between(o, Point::new(5, 1)), Some(Direction::Right));
        assert_eq!(Direction::between(o, Point::new(1, -5)), Some(Direction::Up));
        assert_eq!(Direction::between(o, o), None);
    }

    #[test]
    fn flags_combine_and_clear() {
        let mut f = UpdateFlags::NEW_ON_MAP | UpdateFlags::ATTACK;
        assert!(f.contains(UpdateFlags::ATTACK));
        assert!(f.intersects(UpdateFlags::ATTACK | UpdateFlags::REMOVE));
        assert!(!f.contains(UpdateFlags::ATTACK | UpdateFlags::REMOVE));
        f.insert(UpdateFlags::REMOVE);
        assert_eq!(f.bits(), 0b0100_0011);
        f.remove(UpdateFlags::ATTACK);
        assert_eq!(f.bits(), 0b0100_0001);
        f.clear();
        assert!(f.is_empty());
    }

    #[test]
    fn only_spawn_areas_are_invisible() {
        assert!(!EntityKind::SpawnArea.is_visible());
        assert!(EntityKind::Item.is_visible());
        assert!(!EntityKind::Item.can_move());
        assert!(EntityKind::Npc.can_move());
        assert!(!EntityKind::Npc.can_fight());
        assert!(EntityKind::Character.is_observer());
    }
}
