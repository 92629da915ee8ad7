//! World configuration.

use serde::{Deserialize, Serialize};
use shardline_common::{AROUND_AREA, ItemId, Point, TILE_SIZE};
use shardline_zone::RegionSpec;
use std::collections::BTreeSet;
use std::path::Path;

/// Errors from loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Sprite shown for an item class when it is equipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemClassSpec {
    pub id: u16,
    pub sprite: u16,
}

/// Tunables of the simulation plus the static world layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Half-side of the area of interest, in pixels.
    pub around_area: i32,
    /// Side of a tile, in pixels.
    pub tile_size: i32,
    /// Where visible entities land when asked to appear outside their region.
    pub fallback_position: Point,
    /// Side of a grid cell used for radius queries, in pixels.
    pub zone_cell_size: i32,
    /// Seed of the world RNG (monster wandering, spawn points).
    pub seed: u64,
    /// Length of a tick.
    pub tick_millis: u64,
    pub regions: Vec<RegionSpec>,
    pub items: Vec<ItemClassSpec>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            around_area: AROUND_AREA,
            tile_size: TILE_SIZE,
            fallback_position: Point::new(100, 100),
            zone_cell_size: AROUND_AREA,
            seed: 0,
            tick_millis: 100,
            regions: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl WorldConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_size <= 0 || self.zone_cell_size <= 0 || self.around_area <= 0 {
            return Err(ConfigError::Invalid(
                "tile_size, zone_cell_size and around_area must be positive".into(),
            ));
        }
        if self.tick_millis == 0 {
            return Err(ConfigError::Invalid("tick_millis must be positive".into()));
        }
        let mut seen = BTreeSet::new();
        for region in &self.regions {
            if !seen.insert(region.id) {
                return Err(ConfigError::Invalid(format!("duplicate region id {}", region.id)));
            }
            if region.width == 0 || region.height == 0 {
                return Err(ConfigError::Invalid(format!("region {} has no tiles", region.id)));
            }
        }
        let mut items = BTreeSet::new();
        if let Some(dup) = self.items.iter().find(|i| !items.insert(i.id)) {
            return Err(ConfigError::Invalid(format!("duplicate item class {}", dup.id)));
        }
        Ok(())
    }

    /// Sprite table of the configured item classes.
    pub fn item_sprites(&self) -> impl Iterator<Item = (ItemId, u16)> + '_ {
        self.items.iter().map(|i| (ItemId(i.id), i.sprite))
    }
}
