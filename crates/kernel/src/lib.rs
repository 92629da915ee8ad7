//! Authoritative tick core of a shardline game server: entity lifecycle,
//! deferred mutations and area-of-interest broadcasting.
//!
//! # Invariants
//! - Region membership never changes while regions are iterated; changes
//!   requested meanwhile are queued and applied once the tick is over.
//! - An entity has a public id and a position exactly while it is inserted.
//! - Each observer hears about an entity entering or leaving its range once.
//! - No message without a body is handed to the transport.
//! - Given the same seed, configuration and inputs, ticks produce identical
//!   outbound messages.

pub mod behavior;
pub mod chat;
pub mod config;
pub mod delayed;
pub mod entity;
pub mod handler;
pub mod interest;
pub mod lifecycle;
pub mod script;
pub mod tick;
pub mod timer;
pub mod world;

pub use behavior::ATTACK_RANGE;
pub use config::{ConfigError, ItemClassSpec, WorldConfig};
pub use delayed::{DelayedEvent, DelayedEvents};
pub use entity::{
    Being, CharacterData, Entity, ItemData, LOOK_SLOTS, MonsterData, NpcData, Payload, SpawnAreaData,
    Transaction,
};
pub use handler::{GameHandler, RecordingHandler};
pub use interest::serialize_looks;
pub use lifecycle::{LifecycleError, WarpOutcome};
pub use script::{RegionScript, ScriptContext};
pub use timer::TickTimer;
pub use world::GameState;

pub fn crate_info() -> &'static str {
    "shardline-kernel v0.1.0"
}
