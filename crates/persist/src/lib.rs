//! Persistence collaborator of the game server.
//!
//! # Invariants
//! - Every warp flushes the character's persistent state before any
//!   reinsertion or hand-off, so the stored state is a safe respawn point.
//! - Snapshots are content-hashed and verifiable.

mod snapshot;

pub use snapshot::{AccountLink, CharacterSnapshot, InMemoryAccountLink};

pub fn crate_info() -> &'static str {
    "shardline-persist v0.1.0"
}
