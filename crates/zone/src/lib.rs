//! Spatial regions of the world.
//!
//! # Invariants
//! - A public id belongs to at most one entity of a region at a time.
//! - Only visible entities have a public id and a grid placement.
//! - Membership changes only through `insert` and `remove`.
//!
//! Entities are bucketed into fixed-size square cells by position; radius
//! queries return candidates from every cell touching the query box, and
//! callers apply the exact range test.

mod grid;
mod region;

pub use grid::{CellCoord, GridPartition};
pub use region::{Region, RegionSpec, ZoneError};

pub fn crate_info() -> &'static str {
    "shardline-zone v0.1.0"
}
