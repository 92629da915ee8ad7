//! Shared vocabulary of the shardline world server.
//!
//! # Invariants
//! - Wire codes of kinds, actions and directions never change between releases.
//! - `EntityKey` is stable for an entity's lifetime; `PublicId` only while inserted.

mod types;

pub use types::{
    Action, Direction, EntityKey, EntityKind, ItemId, PublicId, Point, RegionId, UpdateFlags,
};

/// Side of a square tile, in pixels.
pub const TILE_SIZE: i32 = 32;

/// Half-side of the square area of interest around an observer, in pixels.
pub const AROUND_AREA: i32 = 320;

pub fn crate_info() -> &'static str {
    "shardline-common v0.1.0"
}
