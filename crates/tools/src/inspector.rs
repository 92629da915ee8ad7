use serde::Serialize;
use shardline_common::{EntityKey, EntityKind, Point, RegionId};
use shardline_kernel::{GameHandler, GameState, Payload};
use shardline_persist::AccountLink;
use std::fmt;

/// Read-only queries against the world state for debugging and the CLI.
pub struct WorldInspector;

impl WorldInspector {
    pub fn summary<H: GameHandler, A: AccountLink>(world: &GameState<H, A>) -> WorldSummary {
        WorldSummary {
            tick: world.tick(),
            seed: world.config().seed,
            entity_count: world.entity_count(),
            pending_events: world.pending_events(),
            average_tick_micros: world.timer().average().as_micros() as u64,
            regions: world
                .regions()
                .map(|r| RegionSummary {
                    id: r.id(),
                    name: r.name().to_owned(),
                    active: r.is_active(),
                    members: r.len(),
                    visible: r.visible_count(),
                    capacity: r.capacity(),
                })
                .collect(),
        }
    }

    pub fn inspect_entity<H: GameHandler, A: AccountLink>(
        world: &GameState<H, A>,
        key: EntityKey,
    ) -> Option<EntityInfo> {
        world.entity(key).map(|e| EntityInfo {
            key: format!("{key:?}"),
            kind: e.kind(),
            region: e.region(),
            public_id: e.public_id().map(|id| id.0),
            position: e.placement().map(|(_, pos)| pos),
            destination: e.destination(),
            hit_points: e.being().map(|b| b.hit_points),
            label: label_of(e.payload()),
        })
    }

    /// Every inserted entity of a region, in key order.
    pub fn list_region<H: GameHandler, A: AccountLink>(world: &GameState<H, A>, region: RegionId) -> Vec<EntityInfo> {
        world
            .region(region)
            .map(|r| r.everything())
            .unwrap_or_default()
            .into_iter()
            .filter_map(|k| Self::inspect_entity(world, k))
            .collect()
    }
}

fn label_of(payload: &Payload) -> String {
    match payload {
        Payload::Character(c) => c.name.clone(),
        Payload::Monster(m) => m.name.clone(),
        Payload::Npc(n) => n.name.clone(),
        Payload::Item(i) => format!("item #{} x{}", i.item.0, i.amount),
        Payload::SpawnArea(a) => format!("spawner of {} ({}/{})", a.monster_name, a.live(), a.max_beings),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionSummary {
    pub id: RegionId,
    pub name: String,
    pub active: bool,
    pub members: usize,
    pub visible: usize,
    pub capacity: usize,
}

/// Summary of world state for the inspector.
#[derive(Debug, Clone, Serialize)]
pub struct WorldSummary {
    pub tick: u64,
    pub seed: u64,
    pub entity_count: usize,
    pub pending_events: usize,
    pub average_tick_micros: u64,
    pub regions: Vec<RegionSummary>,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World: tick={} seed={} entities={} pending_events={} avg_tick={}us",
            self.tick, self.seed, self.entity_count, self.pending_events, self.average_tick_micros
        )?;
        for r in &self.regions {
            write!(
                f,
                "\n  region {} '{}' {} members={} visible={}/{}",
                r.id.0,
                r.name,
                if r.active { "active" } else { "remote" },
                r.members,
                r.visible,
                r.capacity
            )?;
        }
        Ok(())
    }
}

/// Detailed info about a single entity.
#[derive(Debug, Clone, Serialize)]
pub struct EntityInfo {
    pub key: String,
    pub kind: EntityKind,
    pub region: RegionId,
    pub public_id: Option<u16>,
    pub position: Option<Point>,
    pub destination: Point,
    pub hit_points: Option<u16>,
    pub label: String,
}

impl fmt::Display for EntityInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} '{}' region={}", self.kind, self.label, self.region.0)?;
        match (self.public_id, self.position) {
            (Some(id), Some(pos)) => write!(f, " id={} pos=({}, {})", id, pos.x, pos.y)?,
            _ => write!(f, " detached")?,
        }
        if let Some(hp) = self.hit_points {
            write!(f, " hp={hp}")?;
        }
        Ok(())
    }
}
