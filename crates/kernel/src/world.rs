use crate::config::{ConfigError, WorldConfig};
use crate::delayed::{DelayedEvent, DelayedEvents};
use crate::entity::{CharacterData, Entity, LOOK_SLOTS};
use crate::handler::{GameHandler, RecordingHandler};
use crate::script::RegionScript;
use crate::timer::TickTimer;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use shardline_common::{EntityKey, ItemId, Point, RegionId};
use shardline_persist::{AccountLink, CharacterSnapshot, InMemoryAccountLink};
use shardline_proto::MessageOut;
use shardline_zone::Region;
use slotmap::SlotMap;
use std::collections::BTreeMap;

/// The authoritative state of every region hosted by this process.
///
/// Entities live in an arena and are referenced by `EntityKey`; they are
/// created detached, placed through `insert`, and only destroyed by the
/// lifecycle operations. Regions are kept in a `BTreeMap` so that ticks
/// visit them in the same order on every run.
pub struct GameState<H: GameHandler = RecordingHandler, A: AccountLink = InMemoryAccountLink> {
    pub(crate) config: WorldConfig,
    pub(crate) regions: BTreeMap<RegionId, Region>,
    pub(crate) scripts: BTreeMap<RegionId, Box<dyn RegionScript>>,
    pub(crate) entities: SlotMap<EntityKey, Entity>,
    pub(crate) delayed: DelayedEvents,
    /// Item class to sprite id.
    pub(crate) catalog: BTreeMap<ItemId, u16>,
    pub(crate) handler: H,
    pub(crate) account: A,
    pub(crate) rng: ChaCha8Rng,
    pub(crate) tick: u64,
    /// Set while regions are iterated; membership must not change meanwhile.
    pub(crate) locked: bool,
    pub(crate) timer: TickTimer,
}

impl<H: GameHandler, A: AccountLink> GameState<H, A> {
    pub fn new(config: WorldConfig, handler: H, account: A) -> Result<Self, ConfigError> {
        config.validate()?;
        let regions = config
            .regions
            .iter()
            .map(|spec| {
                let region = Region::new(spec, config.tile_size, config.zone_cell_size);
                (region.id(), region)
            })
            .collect();
        let catalog = config.item_sprites().collect();
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        tracing::info!(regions = config.regions.len(), seed = config.seed, "world state created");
        Ok(Self {
            config,
            regions,
            scripts: BTreeMap::new(),
            entities: SlotMap::with_key(),
            delayed: DelayedEvents::new(),
            catalog,
            handler,
            account,
            rng,
            tick: 0,
            locked: false,
            timer: TickTimer::default(),
        })
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn region(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        self.regions.values()
    }

    pub fn set_region_active(&mut self, id: RegionId, active: bool) -> bool {
        match self.regions.get_mut(&id) {
            Some(region) => {
                region.set_active(active);
                true
            }
            None => false,
        }
    }

    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    /// Mutable access for game logic. Membership and position changes still
    /// have to go through the lifecycle operations or the deferred queue.
    pub fn entity_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityKey, &Entity)> {
        self.entities.iter()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn account(&self) -> &A {
        &self.account
    }

    pub fn timer(&self) -> &TickTimer {
        &self.timer
    }

    pub fn pending_events(&self) -> usize {
        self.delayed.len()
    }

    pub fn pending_event(&self, key: EntityKey) -> Option<DelayedEvent> {
        self.delayed.get(key)
    }

    /// Attaches the script run once per tick for `region`, replacing any
    /// previous one.
    pub fn set_script(&mut self, region: RegionId, script: Box<dyn RegionScript>) {
        self.scripts.insert(region, script);
    }

    /// Adds a detached entity to the arena. It becomes part of its region
    /// once inserted.
    pub fn create(&mut self, entity: Entity) -> EntityKey {
        let kind = entity.kind();
        let key = self.entities.insert(entity);
        tracing::debug!(?key, ?kind, "entity created");
        key
    }

    pub fn enqueue_insert(&mut self, key: EntityKey) {
        self.delayed.enqueue(key, DelayedEvent::Insert);
    }

    pub fn enqueue_remove(&mut self, key: EntityKey) {
        self.delayed.enqueue(key, DelayedEvent::Remove);
    }

    pub fn enqueue_warp(&mut self, key: EntityKey, region: RegionId, pos: Point) {
        self.delayed.enqueue(key, DelayedEvent::Warp { region, pos });
    }

    /// Every outbound client message goes through here; messages without a
    /// body are dropped.
    pub(crate) fn send_to(&mut self, observer: EntityKey, message: MessageOut) {
        if message.is_empty() {
            tracing::trace!(?observer, tag = message.tag(), "empty message skipped");
            return;
        }
        self.handler.send_to(observer, message);
    }

    /// Sprite ids of the four look slots; unknown or empty slots show 0.
    pub(crate) fn sprites_of(&self, character: &CharacterData) -> [u16; LOOK_SLOTS] {
        character
            .equipment
            .map(|slot| slot.and_then(|item| self.catalog.get(&item).copied()).unwrap_or(0))
    }

    /// Persistent state of a character, as stored by the account server.
    pub fn snapshot(&self, key: EntityKey) -> Option<CharacterSnapshot> {
        let entity = self.entities.get(key)?;
        let c = entity.character_data()?;
        Some(CharacterSnapshot::capture(
            c.database_id,
            &c.name,
            entity.region(),
            entity.position(),
            entity.being().map_or(0, |b| b.hit_points),
            &c.attributes,
            c.equipment.map(|slot| slot.map_or(0, |item| item.0)),
        ))
    }

    /// Inserted observers of `region` whose position is in range of `pos`.
    pub(crate) fn observers_around(&self, region: RegionId, pos: Point) -> Vec<EntityKey> {
        let Some(zone) = self.regions.get(&region) else {
            return Vec::new();
        };
        let radius = self.config.around_area;
        zone.around(&[pos], radius)
            .into_iter()
            .filter(|k| {
                self.entities.get(*k).is_some_and(|e| {
                    e.kind().is_observer() && e.is_inserted() && e.position().in_range_of(pos, radius)
                })
            })
            .collect()
    }
}

impl GameState {
    /// World with in-memory collaborators.
    pub fn in_memory(config: WorldConfig) -> Result<Self, ConfigError> {
        Self::new(config, RecordingHandler::new(), InMemoryAccountLink::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SLOT_WEAPON;
    use crate::config::ItemClassSpec;
    use shardline_zone::RegionSpec;

    fn config() -> WorldConfig {
        WorldConfig {
            regions: vec![RegionSpec {
                id: 1,
                name: "town".into(),
                width: 100,
                height: 100,
                capacity: 10,
                active: true,
            }],
            items: vec![ItemClassSpec { id: 501, sprite: 12 }],
            ..WorldConfig::default()
        }
    }

    #[test]
    fn created_entities_are_detached() {
        let mut w = GameState::in_memory(config()).unwrap();
        let key = w.create(Entity::character(RegionId(1), Point::new(50, 50), CharacterData::new(7, "ann")));
        let e = w.entity(key).unwrap();
        assert!(!e.is_inserted());
        assert_eq!(e.placement(), None);
        assert!(!w.region(RegionId(1)).unwrap().contains(key));
    }

    #[test]
    fn empty_messages_never_reach_the_handler() {
        let mut w = GameState::in_memory(config()).unwrap();
        let key = w.create(Entity::character(RegionId(1), Point::new(50, 50), CharacterData::new(7, "ann")));
        w.send_to(key, MessageOut::new(shardline_proto::msg::GPMSG_BEINGS_MOVE));
        assert_eq!(w.handler().total(), 0);
    }

    #[test]
    fn sprites_resolve_through_catalog() {
        let w = GameState::in_memory(config()).unwrap();
        let mut c = CharacterData::new(7, "ann");
        c.equipment[SLOT_WEAPON] = Some(ItemId(501));
        c.equipment[1] = Some(ItemId(999));
        assert_eq!(w.sprites_of(&c), [12, 0, 0, 0]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let bad = WorldConfig { tile_size: 0, ..config() };
        assert!(GameState::in_memory(bad).is_err());
    }
}
