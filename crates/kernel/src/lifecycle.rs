//! Insertion, removal, warping and destruction of entities.

use crate::delayed::DelayedEvent;
use crate::entity::{Payload, Transaction};
use crate::handler::GameHandler;
use crate::interest::write_point;
use crate::world::GameState;
use shardline_common::{EntityKey, EntityKind, Point, RegionId};
use shardline_persist::AccountLink;
use shardline_proto::{MessageOut, msg};
use shardline_zone::ZoneError;

/// Why an entity could not be placed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("region {region:?} has no room for another visible entity")]
    CapacityExceeded { region: RegionId },
    #[error("region {0:?} is not hosted by this server")]
    RegionInactive(RegionId),
    #[error("unknown entity {0:?}")]
    UnknownEntity(EntityKey),
    #[error("unknown region {0:?}")]
    UnknownRegion(RegionId),
    #[error("entity {0:?} is already inserted")]
    AlreadyInserted(EntityKey),
}

impl From<ZoneError> for LifecycleError {
    fn from(err: ZoneError) -> Self {
        match err {
            ZoneError::Full(region, _) => Self::CapacityExceeded { region },
            ZoneError::Inactive(region) => Self::RegionInactive(region),
            ZoneError::AlreadyPresent(key) => Self::AlreadyInserted(key),
        }
    }
}

/// Where a warped entity ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarpOutcome {
    /// Placed in the target region on this server.
    Inserted,
    /// The target region lives on another server; the client was redirected.
    HandedOff,
    /// The entity could not be placed and no longer exists.
    Destroyed,
}

impl<H: GameHandler, A: AccountLink> GameState<H, A> {
    /// Places a created entity in its region.
    ///
    /// Every check happens before anything is modified: on error the entity
    /// is left detached and no message is sent. Visible entities asked to
    /// appear outside the region land on the fallback position.
    pub fn insert(&mut self, key: EntityKey) -> Result<(), LifecycleError> {
        debug_assert!(!self.locked, "insert while regions are being iterated");
        let entity = self.entities.get(key).ok_or(LifecycleError::UnknownEntity(key))?;
        if entity.is_inserted() {
            return Err(LifecycleError::AlreadyInserted(key));
        }
        let region_id = entity.region();
        let kind = entity.kind();
        let region = self
            .regions
            .get_mut(&region_id)
            .ok_or(LifecycleError::UnknownRegion(region_id))?;
        if !region.is_active() {
            return Err(LifecycleError::RegionInactive(region_id));
        }

        if !kind.is_visible() {
            region.insert(key, None)?;
            let pos = entity.position();
            if let Some(entity) = self.entities.get_mut(key) {
                entity.mark_inserted(None, pos);
            }
            tracing::debug!(?key, region = region_id.0, ?kind, "non-visible entity inserted");
            return Ok(());
        }

        let mut pos = entity.position();
        if !region.contains_point(pos) {
            let fallback = self.config.fallback_position;
            tracing::warn!(
                ?key,
                region = region_id.0,
                x = pos.x,
                y = pos.y,
                "position outside region, using fallback"
            );
            pos = fallback;
        }
        if !region.has_room() {
            tracing::error!(?key, region = region_id.0, "region is full");
            return Err(LifecycleError::CapacityExceeded { region: region_id });
        }
        let public_id = region.insert(key, Some(pos))?;
        let map_name = region.name().to_owned();
        if let Some(entity) = self.entities.get_mut(key) {
            entity.mark_inserted(public_id, pos);
        }
        tracing::debug!(?key, region = region_id.0, ?kind, ?public_id, "entity inserted");

        if kind.is_observer() {
            let mut message = MessageOut::new(msg::GPMSG_PLAYER_MAP_CHANGE);
            message.write_string(&map_name);
            write_point(&mut message, pos);
            self.send_to(key, message);
        }
        Ok(())
    }

    /// Inserts, destroying the entity when it cannot be placed.
    ///
    /// An entity that is already inserted is left alone.
    pub fn insert_safe(&mut self, key: EntityKey) -> Result<(), LifecycleError> {
        let result = self.insert(key);
        match &result {
            Err(err @ LifecycleError::AlreadyInserted(_)) => {
                tracing::debug!(?key, %err, "insert ignored");
            }
            Err(err) => {
                tracing::debug!(?key, %err, "insertion failed, destroying entity");
                self.destroy(key);
            }
            Ok(()) => {}
        }
        result
    }

    /// Detaches an entity from its region, telling nearby observers.
    ///
    /// The entity stays in the arena. Removing a detached entity does nothing.
    pub fn remove(&mut self, key: EntityKey) {
        debug_assert!(!self.locked, "remove while regions are being iterated");
        let Some(entity) = self.entities.get(key) else {
            return;
        };
        if !entity.is_inserted() {
            return;
        }
        let region_id = entity.region();
        let kind = entity.kind();
        let placement = entity.placement();
        let item = match entity.payload() {
            Payload::Item(item) => Some(item.item),
            _ => None,
        };

        if kind == EntityKind::Character {
            self.cancel_transaction(key);
        }

        if let Some((public_id, pos)) = placement {
            if kind.can_move() {
                let mut message = MessageOut::new(msg::GPMSG_BEING_LEAVE);
                message.write_u16(public_id.0);
                for observer in self.observers_around(region_id, pos) {
                    if observer != key {
                        self.send_to(observer, message.clone());
                    }
                }
            } else if item.is_some() {
                let mut message = MessageOut::new(msg::GPMSG_ITEMS);
                message.write_u16(0);
                write_point(&mut message, pos);
                for observer in self.observers_around(region_id, pos) {
                    self.send_to(observer, message.clone());
                }
            }
        }

        if let Some(region) = self.regions.get_mut(&region_id) {
            region.remove(key);
        }
        if let Some(entity) = self.entities.get_mut(key) {
            entity.mark_removed();
        }
        tracing::debug!(?key, region = region_id.0, ?kind, "entity removed");
    }

    /// Ends the exchange a character takes part in. A trade partner is told
    /// who left and is freed as well.
    fn cancel_transaction(&mut self, key: EntityKey) {
        let Some(character) = self.entities.get_mut(key).and_then(|e| e.character_data_mut()) else {
            return;
        };
        let transaction = std::mem::take(&mut character.transaction);
        let Transaction::Trade { partner } = transaction else {
            return;
        };
        let leaver = self.entities.get(key).and_then(|e| e.public_id()).map_or(0, |id| id.0);
        if let Some(other) = self.entities.get_mut(partner).and_then(|e| e.character_data_mut()) {
            if other.transaction == (Transaction::Trade { partner: key }) {
                other.transaction = Transaction::None;
            }
        }
        let mut message = MessageOut::new(msg::GPMSG_TRADE_CANCEL);
        message.write_u16(leaver);
        self.send_to(partner, message);
        tracing::debug!(?key, ?partner, "trade cancelled");
    }

    /// Moves an entity to `pos` in `region`, possibly on another server.
    pub fn warp(&mut self, key: EntityKey, region: RegionId, pos: Point) -> Result<WarpOutcome, LifecycleError> {
        let target_active = self
            .regions
            .get(&region)
            .ok_or(LifecycleError::UnknownRegion(region))?
            .is_active();
        if !self.entities.contains_key(key) {
            return Err(LifecycleError::UnknownEntity(key));
        }

        self.remove(key);
        let kind = match self.entities.get_mut(key) {
            Some(entity) => {
                entity.set_region(region);
                entity.set_position(pos);
                entity.clear_destination();
                entity.kind()
            }
            None => return Err(LifecycleError::UnknownEntity(key)),
        };
        if let Some(snapshot) = self.snapshot(key) {
            self.account.send_character_data(snapshot);
        }

        if target_active {
            return match self.insert(key) {
                Ok(()) => Ok(WarpOutcome::Inserted),
                Err(err) => {
                    tracing::error!(?key, region = region.0, %err, "could not place warped entity");
                    self.handler.kill(key);
                    self.destroy(key);
                    Ok(WarpOutcome::Destroyed)
                }
            };
        }

        match self.entities.get(key).and_then(|e| e.character_data()).map(|c| c.database_id) {
            Some(database_id) => {
                let mut message = MessageOut::new(msg::GAMSG_REDIRECT);
                message.write_u32(database_id);
                self.account.send(message);
                self.handler.prepare_server_change(key);
                tracing::debug!(?key, region = region.0, database_id, "character handed off");
                Ok(WarpOutcome::HandedOff)
            }
            None => {
                tracing::warn!(?key, ?kind, region = region.0, "non-character warped off this server");
                self.destroy(key);
                Ok(WarpOutcome::Destroyed)
            }
        }
    }

    /// Frees the arena slot of an entity, detaching it first if needed.
    pub(crate) fn destroy(&mut self, key: EntityKey) {
        if self.entities.get(key).is_some_and(|e| e.is_inserted()) {
            self.remove(key);
        }
        let Some(entity) = self.entities.remove(key) else {
            return;
        };
        if let Payload::Monster(monster) = entity.payload() {
            if let Some(area) = monster.spawned_by {
                if let Some(Payload::SpawnArea(spawner)) = self.entities.get_mut(area).map(|e| e.payload_mut()) {
                    spawner.live.remove(&key);
                }
            }
        }
        tracing::debug!(?key, kind = ?entity.kind(), "entity destroyed");
    }

    /// Removes an entity for good: detach, persist, disconnect, destroy.
    fn discard(&mut self, key: EntityKey) {
        self.remove(key);
        if let Some(snapshot) = self.snapshot(key) {
            self.account.send_character_data(snapshot);
            self.handler.kill(key);
        }
        self.destroy(key);
    }

    /// Applies every pending deferred event, in key order.
    pub(crate) fn drain_delayed(&mut self) {
        for (key, event) in self.delayed.drain() {
            if !self.entities.contains_key(key) {
                tracing::debug!(?key, ?event, "deferred event for a destroyed entity");
                continue;
            }
            match event {
                DelayedEvent::Remove => self.discard(key),
                DelayedEvent::Insert => {
                    // Placement failures destroy the entity; a live one is kept.
                    let _ = self.insert_safe(key);
                }
                DelayedEvent::Warp { region, pos } => {
                    if let Err(err) = self.warp(key, region, pos) {
                        tracing::error!(?key, %err, "deferred warp failed");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::entity::{CharacterData, Entity};
    use shardline_common::{ItemId, PublicId, UpdateFlags};
    use shardline_proto::MessageIn;
    use shardline_zone::RegionSpec;

    fn region(id: u16, capacity: usize, active: bool) -> RegionSpec {
        RegionSpec { id, name: format!("r{id}"), width: 100, height: 100, capacity, active }
    }

    fn world(regions: Vec<RegionSpec>) -> GameState {
        GameState::in_memory(WorldConfig { regions, ..WorldConfig::default() }).unwrap()
    }

    fn hero(w: &mut GameState, db: u32, x: i32, y: i32) -> EntityKey {
        w.create(Entity::character(RegionId(1), Point::new(x, y), CharacterData::new(db, format!("c{db}"))))
    }

    #[test]
    fn insert_places_and_announces_map() {
        let mut w = world(vec![region(1, 10, true)]);
        let k = hero(&mut w, 1, 64, 96);
        w.insert(k).unwrap();
        let e = w.entity(k).unwrap();
        assert_eq!(e.placement(), Some((PublicId(1), Point::new(64, 96))));
        assert_eq!(e.old_position(), e.position());
        assert_eq!(e.destination(), e.position());
        assert!(e.update_flags().contains(UpdateFlags::NEW_ON_MAP));

        let sent = w.handler().tagged(k, msg::GPMSG_PLAYER_MAP_CHANGE);
        assert_eq!(sent.len(), 1);
        let mut m = MessageIn::try_from(sent[0]).unwrap();
        assert_eq!(m.read_string().unwrap(), "r1");
        assert_eq!((m.read_u16().unwrap(), m.read_u16().unwrap()), (64, 96));
    }

    #[test]
    fn out_of_bounds_insert_lands_on_fallback() {
        let mut w = world(vec![region(1, 10, true)]);
        let k = hero(&mut w, 1, 10_000, 10_000);
        w.insert(k).unwrap();
        assert_eq!(w.entity(k).unwrap().position(), Point::new(100, 100));
    }

    #[test]
    fn full_region_rejects_without_side_effects() {
        let mut w = world(vec![region(1, 1, true)]);
        let a = hero(&mut w, 1, 50, 50);
        let b = hero(&mut w, 2, 60, 60);
        w.insert(a).unwrap();
        w.handler_mut().clear();
        assert_eq!(w.insert(b), Err(LifecycleError::CapacityExceeded { region: RegionId(1) }));
        assert_eq!(w.entity(b).unwrap().placement(), None);
        assert_eq!(w.handler().total(), 0);
        assert_eq!(w.region(RegionId(1)).unwrap().len(), 1);
    }

    #[test]
    fn insert_safe_destroys_on_failure() {
        let mut w = world(vec![region(1, 10, false)]);
        let k = hero(&mut w, 1, 50, 50);
        assert_eq!(w.insert_safe(k), Err(LifecycleError::RegionInactive(RegionId(1))));
        assert!(w.entity(k).is_none());
    }

    #[test]
    fn queued_insert_of_a_placed_character_keeps_it() {
        let mut w = world(vec![region(1, 10, true)]);
        let k = hero(&mut w, 9, 50, 50);
        w.insert(k).unwrap();
        w.update();
        w.enqueue_insert(k);
        w.update();
        let e = w.entity(k).expect("character survives");
        assert!(e.is_inserted());
        assert!(w.region(RegionId(1)).unwrap().contains(k));
        assert!(!w.handler().is_killed(k));
        assert_eq!(w.account().flush_count(), 0);
        assert_eq!(w.insert_safe(k), Err(LifecycleError::AlreadyInserted(k)));
        assert!(w.entity(k).is_some());
    }

    #[test]
    fn far_positions_are_clamped_on_the_wire() {
        let wide = RegionSpec { width: 3000, ..region(1, 10, true) };
        let mut w = world(vec![wide]);
        let k = hero(&mut w, 1, 70_000, 50);
        let item = w.create(Entity::item(RegionId(1), Point::new(70_010, 60), ItemId(3), 1));
        w.insert(k).unwrap();
        w.insert(item).unwrap();
        let sent = w.handler().tagged(k, msg::GPMSG_PLAYER_MAP_CHANGE);
        let mut m = MessageIn::try_from(sent[0]).unwrap();
        m.read_string().unwrap();
        assert_eq!((m.read_u16().unwrap(), m.read_u16().unwrap()), (u16::MAX, 50));

        w.handler_mut().clear();
        w.remove(item);
        let items = w.handler().tagged(k, msg::GPMSG_ITEMS);
        let mut m = MessageIn::try_from(items[0]).unwrap();
        assert_eq!([m.read_u16().unwrap(), m.read_u16().unwrap(), m.read_u16().unwrap()], [0, u16::MAX, 60]);
    }

    #[test]
    fn remove_frees_public_id_and_tells_neighbours() {
        let mut w = world(vec![region(1, 10, true)]);
        let a = hero(&mut w, 1, 50, 50);
        let b = hero(&mut w, 2, 80, 80);
        w.insert(a).unwrap();
        w.insert(b).unwrap();
        let id_a = w.entity(a).unwrap().public_id().unwrap();
        w.handler_mut().clear();
        w.remove(a);
        assert_eq!(w.entity(a).unwrap().placement(), None);
        assert_eq!(w.region(RegionId(1)).unwrap().entity(id_a), None);
        let leave = w.handler().tagged(b, msg::GPMSG_BEING_LEAVE);
        assert_eq!(leave.len(), 1);
        assert_eq!(MessageIn::try_from(leave[0]).unwrap().read_u16().unwrap(), id_a.0);
        assert!(w.handler().messages_for(a).is_empty());
    }

    #[test]
    fn removed_item_is_reported_as_vanished() {
        let mut w = world(vec![region(1, 10, true)]);
        let p = hero(&mut w, 1, 50, 50);
        let item = w.create(Entity::item(RegionId(1), Point::new(70, 40), ItemId(3), 1));
        w.insert(p).unwrap();
        w.insert(item).unwrap();
        w.handler_mut().clear();
        w.remove(item);
        let items = w.handler().tagged(p, msg::GPMSG_ITEMS);
        assert_eq!(items.len(), 1);
        let mut m = MessageIn::try_from(items[0]).unwrap();
        assert_eq!([m.read_u16().unwrap(), m.read_u16().unwrap(), m.read_u16().unwrap()], [0, 70, 40]);
    }

    #[test]
    fn leaving_character_cancels_trade() {
        let mut w = world(vec![region(1, 10, true)]);
        let a = hero(&mut w, 1, 50, 50);
        let b = hero(&mut w, 2, 2000, 2000);
        w.insert(a).unwrap();
        w.insert(b).unwrap();
        w.entity_mut(a).unwrap().character_data_mut().unwrap().transaction = Transaction::Trade { partner: b };
        w.entity_mut(b).unwrap().character_data_mut().unwrap().transaction = Transaction::Trade { partner: a };
        let id_a = w.entity(a).unwrap().public_id().unwrap();
        w.remove(a);
        let cancel = w.handler().tagged(b, msg::GPMSG_TRADE_CANCEL);
        assert_eq!(cancel.len(), 1);
        assert_eq!(MessageIn::try_from(cancel[0]).unwrap().read_u16().unwrap(), id_a.0);
        assert_eq!(w.entity(b).unwrap().character_data().unwrap().transaction, Transaction::None);
    }

    #[test]
    fn warp_to_active_region_reinserts() {
        let mut w = world(vec![region(1, 10, true), region(2, 10, true)]);
        let k = hero(&mut w, 9, 50, 50);
        w.insert(k).unwrap();
        assert_eq!(w.warp(k, RegionId(2), Point::new(300, 300)), Ok(WarpOutcome::Inserted));
        let e = w.entity(k).unwrap();
        assert_eq!(e.region(), RegionId(2));
        assert_eq!(e.position(), Point::new(300, 300));
        assert!(!w.region(RegionId(1)).unwrap().contains(k));
        assert!(w.region(RegionId(2)).unwrap().contains(k));
        assert_eq!(w.account().character(9).unwrap().region, RegionId(2));
    }

    #[test]
    fn warp_to_inactive_region_redirects_once() {
        let mut w = world(vec![region(1, 10, true), region(2, 10, false)]);
        let k = hero(&mut w, 9, 50, 50);
        w.insert(k).unwrap();
        assert_eq!(w.warp(k, RegionId(2), Point::new(300, 300)), Ok(WarpOutcome::HandedOff));
        assert_eq!(w.account().redirects(), vec![9]);
        assert_eq!(w.account().flush_count(), 1);
        assert_eq!(w.handler().server_changes(), &[k]);
        assert!(!w.region(RegionId(1)).unwrap().contains(k));
        assert!(!w.region(RegionId(2)).unwrap().contains(k));
        assert!(!w.entity(k).unwrap().is_inserted());
    }

    #[test]
    fn failed_warp_insertion_kills_and_destroys() {
        let mut w = world(vec![region(1, 10, true), region(2, 1, true)]);
        let blocker = w.create(Entity::item(RegionId(2), Point::new(10, 10), ItemId(1), 1));
        w.insert(blocker).unwrap();
        let k = hero(&mut w, 9, 50, 50);
        w.insert(k).unwrap();
        assert_eq!(w.warp(k, RegionId(2), Point::new(30, 30)), Ok(WarpOutcome::Destroyed));
        assert!(w.entity(k).is_none());
        assert!(w.handler().is_killed(k));
    }

    #[test]
    fn warped_item_off_server_is_destroyed() {
        let mut w = world(vec![region(1, 10, true), region(2, 10, false)]);
        let item = w.create(Entity::item(RegionId(1), Point::new(10, 10), ItemId(1), 1));
        w.insert(item).unwrap();
        assert_eq!(w.warp(item, RegionId(2), Point::new(30, 30)), Ok(WarpOutcome::Destroyed));
        assert!(w.entity(item).is_none());
    }

    #[test]
    fn drained_remove_persists_and_disconnects() {
        let mut w = world(vec![region(1, 10, true)]);
        let k = hero(&mut w, 4, 50, 50);
        w.insert(k).unwrap();
        w.enqueue_remove(k);
        w.enqueue_insert(k);
        w.drain_delayed();
        assert!(w.entity(k).is_none());
        assert!(w.handler().is_killed(k));
        assert!(w.account().character(4).is_some());
        assert_eq!(w.region(RegionId(1)).unwrap().len(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "insert while regions are being iterated")]
    fn insert_during_iteration_is_caught() {
        let mut w = world(vec![region(1, 10, true)]);
        let k = hero(&mut w, 1, 50, 50);
        w.locked = true;
        let _ = w.insert(k);
    }
}
