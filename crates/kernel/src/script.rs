//! Per-region script hook.

use crate::delayed::{DelayedEvent, DelayedEvents};
use crate::entity::Entity;
use shardline_common::{EntityKey, Point, RegionId};
use shardline_zone::Region;
use slotmap::SlotMap;

/// Logic attached to a region, run once per tick after the entity hooks.
pub trait RegionScript {
    fn update(&mut self, ctx: &mut ScriptContext<'_>);
}

impl<F> RegionScript for F
where
    F: FnMut(&mut ScriptContext<'_>),
{
    fn update(&mut self, ctx: &mut ScriptContext<'_>) {
        self(ctx)
    }
}

/// What a script may touch while the world is locked: entity state, the
/// arena and the deferred queue. Membership changes are only requested.
pub struct ScriptContext<'a> {
    pub(crate) region: &'a Region,
    pub(crate) entities: &'a mut SlotMap<EntityKey, Entity>,
    pub(crate) delayed: &'a mut DelayedEvents,
    pub(crate) tick: u64,
}

impl ScriptContext<'_> {
    pub fn region(&self) -> RegionId {
        self.region.id()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Members of the region as of the start of the tick.
    pub fn members(&self) -> Vec<EntityKey> {
        self.region.everything()
    }

    pub fn entity(&self, key: EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn entity_mut(&mut self, key: EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    /// Creates an entity and schedules its insertion for the end of the tick.
    pub fn spawn(&mut self, entity: Entity) -> EntityKey {
        let key = self.entities.insert(entity);
        self.delayed.enqueue(key, DelayedEvent::Insert);
        key
    }

    pub fn remove(&mut self, key: EntityKey) {
        self.delayed.enqueue(key, DelayedEvent::Remove);
    }

    pub fn warp(&mut self, key: EntityKey, region: RegionId, pos: Point) {
        self.delayed.enqueue(key, DelayedEvent::Warp { region, pos });
    }
}
