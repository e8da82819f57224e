//! Shadow Configuration
//!
//! Shadow atlas and scheduling settings with serde support.

use serde::{Deserialize, Serialize};

use crate::record::MAX_SHADOW_SOURCES;

/// Shadow settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Atlas tile edge in texels (power of 2)
    pub tile_size: u32,

    /// Shadow tiles re-rendered per frame
    pub max_updates: usize,

    /// Store depth in a color texture instead of a depth texture
    pub depth_to_color: bool,

    /// Request hardware shadow filtering (only honored if the host supports it)
    pub hardware_pcf: bool,

    /// Lights farther than this from the camera keep their stale shadows
    pub update_distance: f32,

    /// Near plane for shadow caster projections
    pub near_plane: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            tile_size: 512,
            max_updates: MAX_SHADOW_SOURCES,
            depth_to_color: false,
            hardware_pcf: true,
            update_distance: 100.0,
            near_plane: 0.05,
        }
    }
}

impl ShadowConfig {
    /// Cheaper settings: small tiles, a handful of updates per frame
    pub fn low_quality() -> Self {
        Self {
            tile_size: 256,
            max_updates: 6,
            hardware_pcf: false,
            update_distance: 40.0,
            ..Default::default()
        }
    }

    /// Validate and clamp values
    pub fn validate(&mut self) {
        self.tile_size = self.tile_size.clamp(16, 4096).next_power_of_two();
        self.max_updates = self.max_updates.min(MAX_SHADOW_SOURCES * 4);
        if !self.update_distance.is_finite() {
            self.update_distance = f32::MAX;
        }
        self.update_distance = self.update_distance.max(0.0);
        self.near_plane = self.near_plane.max(0.001);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        let mut config = ShadowConfig {
            tile_size: 300,
            update_distance: -5.0,
            near_plane: 0.0,
            ..Default::default()
        };
        config.validate();
        assert_eq!(config.tile_size, 512);
        assert_eq!(config.update_distance, 0.0);
        assert!(config.near_plane > 0.0);
    }

    #[test]
    fn test_partial_json() {
        let config: ShadowConfig = serde_json::from_str(r#"{ "tile_size": 1024 }"#).unwrap();
        assert_eq!(config.tile_size, 1024);
        assert_eq!(config.max_updates, MAX_SHADOW_SOURCES);
    }

    #[test]
    fn test_presets() {
        let low = ShadowConfig::low_quality();
        assert!(low.tile_size < ShadowConfig::default().tile_size);
        assert!(!low.depth_to_color);
    }
}
