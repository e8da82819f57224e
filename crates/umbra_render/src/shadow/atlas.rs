//! Shadow Atlas
//!
//! One square texture holding a grid of equally sized shadow tiles, one per
//! shadow source. The atlas starts at [`BASE_ATLAS_SIZE`] and doubles until
//! a `ceil(sqrt(n))` square grid of tiles fits.

use serde::{Deserialize, Serialize};

/// Smallest atlas edge in texels
pub const BASE_ATLAS_SIZE: u32 = 256;

/// Fixed-grid shadow atlas geometry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowAtlas {
    size: u32,
    tile_size: u32,
    grid: u32,
    max_sources: u32,
}

impl ShadowAtlas {
    /// Atlas for `max_sources` tiles of `tile_size` texels
    pub fn new(max_sources: u32, tile_size: u32) -> Self {
        let grid = grid_dimension(max_sources);
        let size = required_size(max_sources, tile_size);
        log::debug!(
            "Shadow atlas {}x{} ({}x{} tiles of {})",
            size,
            size,
            grid,
            grid,
            tile_size
        );
        Self {
            size,
            tile_size,
            grid,
            max_sources,
        }
    }

    /// Atlas edge in texels
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    /// Tiles per row (and per column)
    pub fn grid(&self) -> u32 {
        self.grid
    }

    pub fn max_sources(&self) -> u32 {
        self.max_sources
    }

    /// Texel origin of a source's tile
    pub fn tile_origin(&self, slot: u32) -> Option<[u32; 2]> {
        if slot >= self.max_sources || self.grid == 0 {
            return None;
        }
        let col = slot % self.grid;
        let row = slot / self.grid;
        Some([col * self.tile_size, row * self.tile_size])
    }

    /// Tile viewport: x, y, width, height in texels
    pub fn tile_viewport(&self, slot: u32) -> Option<[u32; 4]> {
        let [x, y] = self.tile_origin(slot)?;
        Some([x, y, self.tile_size, self.tile_size])
    }

    /// Normalized tile rectangle: u, v, width, height
    pub fn tile_uv(&self, slot: u32) -> Option<[f32; 4]> {
        let [x, y] = self.tile_origin(slot)?;
        let size = self.size as f32;
        let extent = self.tile_size as f32 / size;
        Some([x as f32 / size, y as f32 / size, extent, extent])
    }
}

/// Smallest `g` with `g * g >= n`
pub fn grid_dimension(n: u32) -> u32 {
    let mut g = (n as f64).sqrt() as u32;
    while g.saturating_mul(g) < n {
        g += 1;
    }
    while g > 0 && (g - 1).saturating_mul(g - 1) >= n {
        g -= 1;
    }
    g
}

/// Atlas edge needed for `n` tiles of `tile_size` texels
pub fn required_size(n: u32, tile_size: u32) -> u32 {
    let needed = grid_dimension(n).saturating_mul(tile_size);
    let mut size = BASE_ATLAS_SIZE;
    while size < needed {
        size = size.saturating_mul(2);
    }
    size
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_dimension() {
        assert_eq!(grid_dimension(0), 0);
        assert_eq!(grid_dimension(1), 1);
        assert_eq!(grid_dimension(4), 2);
        assert_eq!(grid_dimension(5), 3);
        assert_eq!(grid_dimension(96), 10);
        assert_eq!(grid_dimension(100), 10);
    }

    #[test]
    fn test_default_atlas_size() {
        // 96 sources at 512 texels: 10 * 512 = 5120 -> 8192
        let atlas = ShadowAtlas::new(96, 512);
        assert_eq!(atlas.grid(), 10);
        assert_eq!(atlas.size(), 8192);
    }

    #[test]
    fn test_base_size_is_minimum() {
        assert_eq!(required_size(1, 64), 256);
        assert_eq!(required_size(4, 128), 256);
        assert_eq!(required_size(5, 128), 512);
        assert_eq!(required_size(0, 512), 256);
    }

    #[test]
    fn test_tiles_fit_and_do_not_overlap() {
        let atlas = ShadowAtlas::new(96, 512);
        let mut seen = std::collections::HashSet::new();
        for slot in 0..96 {
            let [x, y, w, h] = atlas.tile_viewport(slot).unwrap();
            assert!(x + w <= atlas.size());
            assert!(y + h <= atlas.size());
            assert!(seen.insert((x, y)));
        }
        assert!(atlas.tile_uv(96).is_none());
    }

    #[test]
    fn test_tile_uv() {
        let atlas = ShadowAtlas::new(4, 128);
        assert_eq!(atlas.tile_uv(0), Some([0.0, 0.0, 0.5, 0.5]));
        assert_eq!(atlas.tile_uv(1), Some([0.5, 0.0, 0.5, 0.5]));
        assert_eq!(atlas.tile_uv(3), Some([0.5, 0.5, 0.5, 0.5]));
    }
}
