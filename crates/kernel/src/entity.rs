//! Entities and their kind-specific state.

use shardline_common::{
    Action, Direction, EntityKey, EntityKind, ItemId, Point, PublicId, RegionId, UpdateFlags,
};
use std::collections::BTreeSet;

/// Number of equipment slots shown to other players.
pub const LOOK_SLOTS: usize = 4;

/// Equipment slot indices, in wire order.
pub const SLOT_WEAPON: usize = 0;
pub const SLOT_HEAD: usize = 1;
pub const SLOT_TORSO: usize = 2;
pub const SLOT_LEGS: usize = 3;

/// Combat and activity state of beings (characters, monsters, NPCs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Being {
    pub action: Action,
    pub hit_points: u16,
    pub max_hit_points: u16,
    /// Damage dealt per successful attack.
    pub power: u16,
    pub attack_type: u8,
    /// Damage taken this tick; cleared by the orchestrator.
    hits: Vec<u16>,
}

impl Being {
    pub fn new(hit_points: u16, power: u16) -> Self {
        Self {
            action: Action::Stand,
            hit_points,
            max_hit_points: hit_points,
            power,
            attack_type: 0,
            hits: Vec::new(),
        }
    }

    pub fn hits(&self) -> &[u16] {
        &self.hits
    }

    pub fn is_dead(&self) -> bool {
        self.action == Action::Dead
    }
}

/// In-flight exchange a character takes part in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transaction {
    #[default]
    None,
    Trade { partner: EntityKey },
    Shop { npc: EntityKey },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterData {
    pub database_id: u32,
    pub name: String,
    pub hair_style: u8,
    pub hair_color: u8,
    pub gender: u8,
    /// Item class per look slot.
    pub equipment: [Option<ItemId>; LOOK_SLOTS],
    pub attributes: Vec<u16>,
    modified_attributes: BTreeSet<usize>,
    pub transaction: Transaction,
    /// Sprites as last reported to observers; `None` before the first report.
    reported_looks: Option<[u16; LOOK_SLOTS]>,
}

impl CharacterData {
    pub fn new(database_id: u32, name: impl Into<String>) -> Self {
        Self {
            database_id,
            name: name.into(),
            hair_style: 0,
            hair_color: 0,
            gender: 0,
            equipment: [None; LOOK_SLOTS],
            attributes: Vec::new(),
            modified_attributes: BTreeSet::new(),
            transaction: Transaction::None,
            reported_looks: None,
        }
    }

    pub fn reported_looks(&self) -> Option<&[u16; LOOK_SLOTS]> {
        self.reported_looks.as_ref()
    }

    pub(crate) fn set_reported_looks(&mut self, sprites: [u16; LOOK_SLOTS]) {
        self.reported_looks = Some(sprites);
    }

    /// Attribute changes not yet sent to the owning client.
    pub(crate) fn take_modified_attributes(&mut self) -> Vec<(u16, u16)> {
        std::mem::take(&mut self.modified_attributes)
            .into_iter()
            .filter_map(|i| Some((i as u16, *self.attributes.get(i)?)))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonsterData {
    pub species: u16,
    pub name: String,
    /// Ticks until the next wander decision, or until removal once dead.
    pub countdown: u16,
    /// Wandering box, corners inclusive.
    pub wander: (Point, Point),
    pub spawned_by: Option<EntityKey>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpcData {
    pub npc_id: u16,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemData {
    pub item: ItemId,
    pub amount: u16,
}

/// Keeps a population of monsters alive inside a rectangle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnAreaData {
    pub species: u16,
    pub monster_name: String,
    pub zone: (Point, Point),
    pub max_beings: u16,
    /// Ticks between two spawns.
    pub spawn_rate: u16,
    pub countdown: u16,
    pub(crate) live: BTreeSet<EntityKey>,
}

impl SpawnAreaData {
    pub fn new(species: u16, monster_name: impl Into<String>, zone: (Point, Point), max_beings: u16, spawn_rate: u16) -> Self {
        Self {
            species,
            monster_name: monster_name.into(),
            zone,
            max_beings,
            spawn_rate,
            countdown: 0,
            live: BTreeSet::new(),
        }
    }

    pub fn live(&self) -> usize {
        self.live.len()
    }
}

/// Kind-specific state; the kind of an entity is the variant it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Character(Box<CharacterData>),
    Monster(MonsterData),
    Npc(NpcData),
    Item(ItemData),
    SpawnArea(SpawnAreaData),
}

impl Payload {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Character(_) => EntityKind::Character,
            Self::Monster(_) => EntityKind::Monster,
            Self::Npc(_) => EntityKind::Npc,
            Self::Item(_) => EntityKind::Item,
            Self::SpawnArea(_) => EntityKind::SpawnArea,
        }
    }
}

/// Anything placeable in the world.
///
/// Position and public id are only meaningful while the entity is inserted;
/// `placement` is the authoritative view of both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    region: RegionId,
    inserted: bool,
    public_id: Option<PublicId>,
    pos: Point,
    old_pos: Point,
    dst: Point,
    direction: Direction,
    /// Pixels per second.
    speed: u16,
    flags: UpdateFlags,
    being: Option<Being>,
    payload: Payload,
}

impl Entity {
    fn new(region: RegionId, pos: Point, being: Option<Being>, payload: Payload) -> Self {
        Self {
            region,
            inserted: false,
            public_id: None,
            pos,
            old_pos: pos,
            dst: pos,
            direction: Direction::default(),
            speed: 0,
            flags: UpdateFlags::empty(),
            being,
            payload,
        }
    }

    pub fn character(region: RegionId, pos: Point, data: CharacterData) -> Self {
        Self::new(region, pos, Some(Being::new(100, 10)), Payload::Character(Box::new(data))).with_speed(200)
    }

    pub fn monster(region: RegionId, pos: Point, data: MonsterData) -> Self {
        Self::new(region, pos, Some(Being::new(50, 5)), Payload::Monster(data)).with_speed(150)
    }

    pub fn npc(region: RegionId, pos: Point, data: NpcData) -> Self {
        Self::new(region, pos, Some(Being::new(1, 0)), Payload::Npc(data))
    }

    pub fn item(region: RegionId, pos: Point, item: ItemId, amount: u16) -> Self {
        Self::new(region, pos, None, Payload::Item(ItemData { item, amount }))
    }

    pub fn spawn_area(region: RegionId, data: SpawnAreaData) -> Self {
        Self::new(region, Point::default(), None, Payload::SpawnArea(data))
    }

    pub fn with_speed(mut self, speed: u16) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_being(mut self, being: Being) -> Self {
        if self.being.is_some() {
            self.being = Some(being);
        }
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.payload.kind()
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn is_inserted(&self) -> bool {
        self.inserted
    }

    pub fn public_id(&self) -> Option<PublicId> {
        self.public_id
    }

    /// Public id and position, present exactly while the entity is placed.
    pub fn placement(&self) -> Option<(PublicId, Point)> {
        self.public_id.map(|id| (id, self.pos))
    }

    /// Current position, or the requested one while not inserted.
    pub fn position(&self) -> Point {
        self.pos
    }

    pub fn old_position(&self) -> Point {
        self.old_pos
    }

    pub fn destination(&self) -> Point {
        self.dst
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn speed(&self) -> u16 {
        self.speed
    }

    pub fn update_flags(&self) -> UpdateFlags {
        self.flags
    }

    pub fn raise_update_flags(&mut self, flags: UpdateFlags) {
        self.flags.insert(flags);
    }

    pub fn being(&self) -> Option<&Being> {
        self.being.as_ref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    pub fn character_data(&self) -> Option<&CharacterData> {
        match &self.payload {
            Payload::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn character_data_mut(&mut self) -> Option<&mut CharacterData> {
        match &mut self.payload {
            Payload::Character(c) => Some(c),
            _ => None,
        }
    }

    pub fn action(&self) -> Action {
        self.being.as_ref().map_or(Action::Stand, |b| b.action)
    }

    /// Changes the action of a being, raising the action-change flag.
    pub fn set_action(&mut self, action: Action) {
        if let Some(being) = &mut self.being {
            if being.action != action {
                being.action = action;
                self.flags.insert(UpdateFlags::ACTION_CHANGE);
            }
        }
    }

    /// Turns a being in place, raising the direction-change flag.
    pub fn set_direction(&mut self, direction: Direction) {
        if self.direction != direction {
            self.direction = direction;
            self.flags.insert(UpdateFlags::DIR_CHANGE);
        }
    }

    /// Faces without notifying observers; movement and attacks carry the
    /// direction on their own.
    pub(crate) fn face(&mut self, direction: Direction) {
        self.direction = direction;
    }

    pub fn set_destination(&mut self, dst: Point) {
        if self.kind().can_move() {
            self.dst = dst;
            self.flags.insert(UpdateFlags::NEW_DESTINATION);
        }
    }

    pub fn clear_destination(&mut self) {
        self.dst = self.pos;
    }

    /// Puts an item class in a look slot, raising the looks-change flag.
    pub fn equip(&mut self, slot: usize, item: Option<ItemId>) {
        let Payload::Character(c) = &mut self.payload else {
            return;
        };
        if let Some(entry) = c.equipment.get_mut(slot) {
            if *entry != item {
                *entry = item;
                self.flags.insert(UpdateFlags::LOOKS_CHANGE);
            }
        }
    }

    /// Sets a character attribute; the change is reported to its own client.
    pub fn set_attribute(&mut self, index: usize, value: u16) {
        if let Payload::Character(c) = &mut self.payload {
            if c.attributes.len() <= index {
                c.attributes.resize(index + 1, 0);
            }
            if c.attributes[index] != value {
                c.attributes[index] = value;
                c.modified_attributes.insert(index);
            }
        }
    }

    /// Records damage taken this tick. Returns true when the hit was lethal.
    pub(crate) fn take_hit(&mut self, amount: u16) -> bool {
        let Some(being) = &mut self.being else {
            return false;
        };
        if being.is_dead() {
            return false;
        }
        being.hits.push(amount);
        being.hit_points = being.hit_points.saturating_sub(amount);
        being.hit_points == 0
    }

    /// Kills a being: action Dead, no destination, corpse timer for monsters.
    pub(crate) fn die(&mut self) {
        self.set_action(Action::Dead);
        self.clear_destination();
        if let Payload::Monster(m) = &mut self.payload {
            m.countdown = 50;
        }
    }

    pub(crate) fn set_region(&mut self, region: RegionId) {
        self.region = region;
    }

    /// Requested position while detached, or a movement step while placed.
    pub(crate) fn set_position(&mut self, pos: Point) {
        self.pos = pos;
    }

    pub(crate) fn begin_move(&mut self) {
        self.old_pos = self.pos;
    }

    pub(crate) fn mark_inserted(&mut self, public_id: Option<PublicId>, pos: Point) {
        self.inserted = true;
        self.public_id = public_id;
        self.pos = pos;
        self.old_pos = pos;
        self.dst = pos;
        // A destination set while detached is dropped with its flag.
        self.flags.remove(UpdateFlags::NEW_DESTINATION);
        if public_id.is_some() {
            self.flags.insert(UpdateFlags::NEW_ON_MAP);
        }
    }

    pub(crate) fn mark_removed(&mut self) {
        self.inserted = false;
        self.public_id = None;
        self.flags.clear();
        if let Some(being) = &mut self.being {
            being.hits.clear();
        }
    }

    /// Resets per-tick state once every observer has been informed.
    pub(crate) fn clear_tick_state(&mut self) {
        self.flags.clear();
        if let Some(being) = &mut self.being {
            being.hits.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hero() -> Entity {
        Entity::character(RegionId(1), Point::new(10, 10), CharacterData::new(1, "hero"))
    }

    #[test]
    fn kind_follows_payload() {
        assert_eq!(hero().kind(), EntityKind::Character);
        let item = Entity::item(RegionId(1), Point::new(0, 0), ItemId(3), 1);
        assert_eq!(item.kind(), EntityKind::Item);
        assert!(item.being().is_none());
    }

    #[test]
    fn not_placed_until_inserted() {
        let mut e = hero();
        assert_eq!(e.placement(), None);
        e.mark_inserted(Some(PublicId(4)), Point::new(50, 60));
        assert_eq!(e.placement(), Some((PublicId(4), Point::new(50, 60))));
        assert!(e.update_flags().contains(UpdateFlags::NEW_ON_MAP));
        e.mark_removed();
        assert_eq!(e.placement(), None);
        assert!(e.update_flags().is_empty());
    }

    #[test]
    fn destination_set_before_insertion_is_dropped_with_its_flag() {
        let mut e = hero();
        e.set_destination(Point::new(300, 10));
        assert!(e.update_flags().contains(UpdateFlags::NEW_DESTINATION));
        e.mark_inserted(Some(PublicId(2)), Point::new(10, 10));
        assert_eq!(e.destination(), Point::new(10, 10));
        assert!(!e.update_flags().contains(UpdateFlags::NEW_DESTINATION));
        assert!(e.update_flags().contains(UpdateFlags::NEW_ON_MAP));
    }

    #[test]
    fn setters_raise_flags_only_on_change() {
        let mut e = hero();
        e.set_action(Action::Stand);
        e.set_direction(Direction::Down);
        assert!(e.update_flags().is_empty());

        e.set_action(Action::Sit);
        e.set_direction(Direction::Left);
        e.equip(SLOT_HEAD, Some(ItemId(7)));
        let f = e.update_flags();
        assert!(f.contains(UpdateFlags::ACTION_CHANGE | UpdateFlags::DIR_CHANGE | UpdateFlags::LOOKS_CHANGE));
    }

    #[test]
    fn items_never_get_destinations() {
        let mut item = Entity::item(RegionId(1), Point::new(5, 5), ItemId(3), 1);
        item.set_destination(Point::new(50, 50));
        assert_eq!(item.destination(), Point::new(5, 5));
        assert!(item.update_flags().is_empty());
    }

    #[test]
    fn lethal_hit_is_reported_once() {
        let mut e = hero().with_being(Being::new(15, 1));
        assert!(!e.take_hit(10));
        assert!(e.take_hit(10));
        e.die();
        assert!(!e.take_hit(10));
        assert_eq!(e.being().unwrap().hits(), &[10, 10]);
        e.clear_tick_state();
        assert!(e.being().unwrap().hits().is_empty());
    }

    #[test]
    fn modified_attributes_are_taken_once() {
        let mut e = hero();
        e.set_attribute(2, 40);
        e.set_attribute(0, 7);
        e.set_attribute(2, 40);
        let c = e.character_data_mut().unwrap();
        assert_eq!(c.take_modified_attributes(), vec![(0, 7), (2, 40)]);
        assert!(c.take_modified_attributes().is_empty());
    }
}
