//! The tick orchestrator.

use crate::delayed::DelayedEvent;
use crate::handler::GameHandler;
use crate::world::GameState;
use shardline_common::{EntityKey, RegionId, UpdateFlags};
use shardline_persist::AccountLink;
use std::time::Instant;

impl<H: GameHandler, A: AccountLink> GameState<H, A> {
    /// Advances every active region by one tick, informs every observer,
    /// then applies the membership changes requested during the tick.
    pub fn update(&mut self) {
        let _span = tracing::info_span!("tick", tick = self.tick).entered();
        let started = Instant::now();

        self.locked = true;
        let active: Vec<RegionId> = self.regions.values().filter(|r| r.is_active()).map(|r| r.id()).collect();
        for id in active {
            self.update_region(id);
        }
        self.locked = false;

        self.drain_delayed();
        self.tick += 1;

        let elapsed = started.elapsed();
        self.timer.record(elapsed);
        tracing::trace!(?elapsed, average = ?self.timer.average(), "tick complete");
    }

    fn update_region(&mut self, id: RegionId) {
        let _span = tracing::debug_span!("region", id = id.0).entered();
        let Some(members) = self.regions.get(&id).map(|r| r.everything()) else {
            return;
        };

        for &key in &members {
            self.update_entity(key);
        }
        self.run_script(id);
        self.perform_actions(id, &members);
        let moved = self.move_entities(id, &members);
        if let Some(region) = self.regions.get_mut(&id) {
            region.update_partition(moved);
        }

        for &key in &members {
            if self.entities.get(key).is_some_and(|e| e.update_flags().contains(UpdateFlags::REMOVE)) {
                self.delayed.enqueue(key, DelayedEvent::Remove);
            }
        }

        let observers: Vec<EntityKey> = members
            .iter()
            .copied()
            .filter(|&k| self.entities.get(k).is_some_and(|e| e.kind().is_observer()))
            .collect();
        for observer in observers {
            self.report_to(observer);
        }

        for &key in &members {
            let sprites = self.entities.get(key).and_then(|e| e.character_data()).map(|c| self.sprites_of(c));
            if let Some(e) = self.entities.get_mut(key) {
                if let (Some(sprites), Some(c)) = (sprites, e.character_data_mut()) {
                    c.set_reported_looks(sprites);
                }
                e.clear_tick_state();
            }
        }
    }
}
