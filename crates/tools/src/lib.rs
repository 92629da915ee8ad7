//! Developer tooling: read-only views of a running world.
//!
//! # Invariants
//! - Inspecting never mutates the world.

mod inspector;

pub use inspector::{EntityInfo, RegionSummary, WorldInspector, WorldSummary};

pub fn crate_info() -> &'static str {
    "shardline-tools v0.1.0"
}
