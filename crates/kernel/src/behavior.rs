//! Per-tick entity behaviour: update hooks, attacks and movement.

use crate::entity::{Entity, MonsterData, Payload};
use crate::handler::GameHandler;
use crate::script::ScriptContext;
use crate::world::GameState;
use rand::Rng;
use shardline_common::{Action, Direction, EntityKey, EntityKind, Point, RegionId, UpdateFlags};
use shardline_persist::AccountLink;

/// Reach of a melee attack, in pixels on each axis.
pub const ATTACK_RANGE: i32 = 64;

/// Ticks a monster waits before picking its next destination.
const WANDER_MIN_TICKS: u16 = 10;
const WANDER_SPREAD_TICKS: u16 = 10;

fn random_point(rng: &mut impl Rng, (min, max): (Point, Point)) -> Point {
    Point::new(
        rng.gen_range(min.x.min(max.x)..=min.x.max(max.x)),
        rng.gen_range(min.y.min(max.y)..=min.y.max(max.y)),
    )
}

impl<H: GameHandler, A: AccountLink> GameState<H, A> {
    /// Runs the autonomous behaviour of one entity.
    pub(crate) fn update_entity(&mut self, key: EntityKey) {
        match self.entities.get(key).map(Entity::kind) {
            Some(EntityKind::Monster) => self.update_monster(key),
            Some(EntityKind::SpawnArea) => self.update_spawn_area(key),
            _ => {}
        }
    }

    /// Wanders while alive; once dead, waits out the corpse timer and asks
    /// to be removed.
    fn update_monster(&mut self, key: EntityKey) {
        let Some(entity) = self.entities.get_mut(key) else {
            return;
        };
        let dead = entity.being().is_some_and(|b| b.is_dead());
        let Payload::Monster(monster) = entity.payload_mut() else {
            return;
        };
        if monster.countdown > 0 {
            monster.countdown -= 1;
        } else if dead {
            entity.raise_update_flags(UpdateFlags::REMOVE);
        } else {
            monster.countdown = WANDER_MIN_TICKS + self.rng.gen_range(0..WANDER_SPREAD_TICKS);
            let dst = random_point(&mut self.rng, monster.wander);
            tracing::trace!(?key, x = dst.x, y = dst.y, "monster picked a destination");
            entity.set_destination(dst);
        }
    }

    fn update_spawn_area(&mut self, key: EntityKey) {
        let Some(area_entity) = self.entities.get_mut(key) else {
            return;
        };
        let region = area_entity.region();
        let Payload::SpawnArea(area) = area_entity.payload_mut() else {
            return;
        };
        if area.countdown > 0 {
            area.countdown -= 1;
            return;
        }
        if area.live.len() >= usize::from(area.max_beings) {
            return;
        }
        area.countdown = area.spawn_rate;
        let pos = random_point(&mut self.rng, area.zone);
        let data = MonsterData {
            species: area.species,
            name: area.monster_name.clone(),
            countdown: 0,
            wander: area.zone,
            spawned_by: Some(key),
        };
        let monster = self.entities.insert(Entity::monster(region, pos, data));
        if let Some(Payload::SpawnArea(area)) = self.entities.get_mut(key).map(|e| e.payload_mut()) {
            area.live.insert(monster);
        }
        self.enqueue_insert(monster);
        tracing::debug!(area = ?key, ?monster, x = pos.x, y = pos.y, "monster spawned");
    }

    pub(crate) fn run_script(&mut self, id: RegionId) {
        let Self { regions, scripts, entities, delayed, tick, .. } = self;
        let (Some(script), Some(region)) = (scripts.get_mut(&id), regions.get(&id)) else {
            return;
        };
        let mut ctx = ScriptContext { region, entities, delayed, tick: *tick };
        script.update(&mut ctx);
    }

    /// Resolves the attacks of every being whose action is Attack.
    pub(crate) fn perform_actions(&mut self, id: RegionId, members: &[EntityKey]) {
        let Some(region) = self.regions.get(&id) else {
            return;
        };
        for &attacker in members {
            let Some(a) = self.entities.get(attacker) else {
                continue;
            };
            let attacking = a.is_inserted()
                && a.kind().can_fight()
                && a.being().is_some_and(|b| !b.is_dead() && b.action == Action::Attack);
            if !attacking {
                continue;
            }
            let origin = a.position();
            let power = a.being().map_or(0, |b| b.power);
            let victim = region
                .around(&[origin], ATTACK_RANGE)
                .into_iter()
                .filter(|&k| k != attacker)
                .filter_map(|k| {
                    let v = self.entities.get(k)?;
                    let alive = v.being().is_some_and(|b| !b.is_dead());
                    let reach = v.position().in_range_of(origin, ATTACK_RANGE);
                    (v.kind().can_fight() && alive && reach)
                        .then(|| ((v.position().as_ivec2() - origin.as_ivec2()).abs().max_element(), k))
                })
                .min();
            let Some((_, victim)) = victim else {
                continue;
            };
            let target = self.entities.get(victim).map(Entity::position);

            if let Some(a) = self.entities.get_mut(attacker) {
                a.raise_update_flags(UpdateFlags::ATTACK);
                if let Some(dir) = target.and_then(|t| Direction::between(origin, t)) {
                    a.face(dir);
                }
            }
            if let Some(v) = self.entities.get_mut(victim) {
                if v.take_hit(power) {
                    v.die();
                    tracing::debug!(?attacker, ?victim, "being killed");
                }
            }
        }
    }

    /// Advances every moving entity one step toward its destination.
    /// Returns the new positions of the entities that moved.
    pub(crate) fn move_entities(&mut self, id: RegionId, members: &[EntityKey]) -> Vec<(EntityKey, Point)> {
        let Some(region) = self.regions.get(&id) else {
            return Vec::new();
        };
        let limit = i64::from(self.config.zone_cell_size);
        let tick_millis = i64::try_from(self.config.tick_millis).unwrap_or(i64::MAX);
        let mut moved = Vec::new();
        for &key in members {
            let Some(e) = self.entities.get_mut(key) else {
                continue;
            };
            e.begin_move();
            if !e.is_inserted() || !e.kind().can_move() || e.being().is_some_and(|b| b.is_dead()) {
                continue;
            }
            let (pos, dst) = (e.position(), e.destination());
            if pos == dst {
                continue;
            }
            let step = (i64::from(e.speed()).saturating_mul(tick_millis) / 1000).clamp(0, limit) as i32;
            let next = pos.step_towards(dst, step);
            if !region.contains_point(next) {
                tracing::debug!(?key, x = next.x, y = next.y, "destination outside region, stopping");
                e.clear_destination();
                continue;
            }
            if let Some(dir) = Direction::between(pos, next) {
                e.face(dir);
            }
            e.set_position(next);
            moved.push((key, next));
        }
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::entity::{Being, CharacterData, SpawnAreaData};
    use shardline_zone::RegionSpec;

    fn world() -> GameState {
        let config = WorldConfig {
            regions: vec![RegionSpec {
                id: 1,
                name: "field".into(),
                width: 100,
                height: 100,
                capacity: 100,
                active: true,
            }],
            seed: 3,
            ..WorldConfig::default()
        };
        GameState::in_memory(config).unwrap()
    }

    fn wolf(spot: Point) -> Entity {
        let data = MonsterData {
            species: 2,
            name: "wolf".into(),
            countdown: 0,
            wander: (Point::new(100, 100), Point::new(200, 200)),
            spawned_by: None,
        };
        Entity::monster(RegionId(1), spot, data)
    }

    #[test]
    fn monster_wanders_inside_its_box() {
        let mut w = world();
        let k = w.create(wolf(Point::new(150, 150)));
        w.insert(k).unwrap();
        w.update_entity(k);
        let e = w.entity(k).unwrap();
        let dst = e.destination();
        assert!((100..=200).contains(&dst.x) && (100..=200).contains(&dst.y));
        assert!(e.update_flags().contains(UpdateFlags::NEW_DESTINATION));
        let Payload::Monster(m) = e.payload() else { unreachable!() };
        assert!((10..20).contains(&m.countdown));
    }

    #[test]
    fn dead_monster_asks_for_removal_after_corpse_timer() {
        let mut w = world();
        let k = w.create(wolf(Point::new(150, 150)));
        w.insert(k).unwrap();
        w.entity_mut(k).unwrap().die();
        for _ in 0..50 {
            w.update_entity(k);
            assert!(!w.entity(k).unwrap().update_flags().contains(UpdateFlags::REMOVE));
        }
        w.update_entity(k);
        assert!(w.entity(k).unwrap().update_flags().contains(UpdateFlags::REMOVE));
    }

    #[test]
    fn spawn_area_respects_population_cap() {
        let mut w = world();
        let zone = (Point::new(300, 300), Point::new(400, 400));
        let area = w.create(Entity::spawn_area(RegionId(1), SpawnAreaData::new(2, "wolf", zone, 2, 0)));
        w.insert(area).unwrap();
        for _ in 0..5 {
            w.update_entity(area);
        }
        let Payload::SpawnArea(data) = w.entity(area).unwrap().payload() else { unreachable!() };
        assert_eq!(data.live(), 2);
        assert_eq!(w.pending_events(), 2);
    }

    #[test]
    fn attack_hits_nearest_fighter() {
        let mut w = world();
        let hero = w.create(
            Entity::character(RegionId(1), Point::new(100, 100), CharacterData::new(1, "a"))
                .with_being(Being::new(100, 30)),
        );
        let near = w.create(wolf(Point::new(120, 100)));
        let far = w.create(wolf(Point::new(150, 100)));
        for k in [hero, near, far] {
            w.insert(k).unwrap();
        }
        w.entity_mut(hero).unwrap().set_action(Action::Attack);
        w.perform_actions(RegionId(1), &[hero, near, far]);

        assert!(w.entity(hero).unwrap().update_flags().contains(UpdateFlags::ATTACK));
        assert_eq!(w.entity(hero).unwrap().direction(), Direction::Right);
        assert_eq!(w.entity(near).unwrap().being().unwrap().hits(), &[30]);
        assert!(w.entity(far).unwrap().being().unwrap().hits().is_empty());
    }

    #[test]
    fn lethal_attack_kills() {
        let mut w = world();
        let hero = w.create(
            Entity::character(RegionId(1), Point::new(100, 100), CharacterData::new(1, "a"))
                .with_being(Being::new(100, 80)),
        );
        let prey = w.create(wolf(Point::new(100, 130)));
        w.insert(hero).unwrap();
        w.insert(prey).unwrap();
        w.entity_mut(hero).unwrap().set_action(Action::Attack);
        w.perform_actions(RegionId(1), &[hero, prey]);
        let p = w.entity(prey).unwrap();
        assert_eq!(p.action(), Action::Dead);
        assert!(p.update_flags().contains(UpdateFlags::ACTION_CHANGE));
    }

    #[test]
    fn movement_steps_by_speed_and_faces_silently() {
        let mut w = world();
        let k = w.create(
            Entity::character(RegionId(1), Point::new(100, 100), CharacterData::new(1, "a")).with_speed(200),
        );
        w.insert(k).unwrap();
        w.entity_mut(k).unwrap().set_destination(Point::new(100, 300));
        w.entity_mut(k).unwrap().clear_tick_state();
        let moved = w.move_entities(RegionId(1), &[k]);
        assert_eq!(moved, vec![(k, Point::new(100, 120))]);
        let e = w.entity(k).unwrap();
        assert_eq!(e.old_position(), Point::new(100, 100));
        assert_eq!(e.direction(), Direction::Down);
        assert!(e.update_flags().is_empty());
    }
}
