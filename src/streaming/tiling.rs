//! Mapping between map coordinates and quadtree tile addresses
//!
//! Tile `(0, 0, 0)` covers the whole square extent anchored at the bottom-left
//! corner of the map. Each level halves the tile side, and `y` grows upward.

use crate::core::types::{DVec2, Vec3};
use crate::math::Aabb;
use super::node::ChunkAddress;

/// Square tiling of a rectangular map extent
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TilingScheme {
    /// Bottom-left corner of the map
    pub origin: DVec2,
    /// Side length of the level-0 tile
    pub base_tile_side: f64,
}

impl TilingScheme {
    /// Tiling anchored at `min` that covers a `size` extent
    ///
    /// The root tile is square, so the longer side of `size` wins.
    pub fn new(min: DVec2, size: DVec2) -> Self {
        Self {
            origin: min,
            base_tile_side: size.x.max(size.y),
        }
    }

    /// Tiling covering the rectangle spanned by two corners
    pub fn from_extent(min: DVec2, max: DVec2) -> Self {
        Self::new(min, max - min)
    }

    /// Side length of a tile at `depth`
    pub fn tile_side(&self, depth: u32) -> f64 {
        self.base_tile_side / 2f64.powi(depth as i32)
    }

    /// Map position of a tile's bottom-left corner
    pub fn tile_to_map(&self, x: u32, y: u32, depth: u32) -> DVec2 {
        let side = self.tile_side(depth);
        self.origin + DVec2::new(x as f64 * side, y as f64 * side)
    }

    /// Fractional tile coordinates of a map position at `depth`
    ///
    /// The integer part is the tile containing the point. Points left of or
    /// below the origin give negative coordinates.
    pub fn map_to_tile(&self, point: DVec2, depth: u32) -> DVec2 {
        (point - self.origin) / self.tile_side(depth)
    }

    /// Map extent of a tile as `(min, max)` corners
    pub fn tile_to_extent(&self, x: u32, y: u32, depth: u32) -> (DVec2, DVec2) {
        (self.tile_to_map(x, y, depth), self.tile_to_map(x + 1, y + 1, depth))
    }

    /// Extent of the tile at `address`
    pub fn address_extent(&self, address: ChunkAddress) -> (DVec2, DVec2) {
        self.tile_to_extent(address.x, address.y, address.depth)
    }

    /// World-space box of a tile, with map `x`/`y` on world `x`/`z`
    pub fn tile_bbox(&self, address: ChunkAddress, y_min: f32, y_max: f32) -> Aabb {
        let (min, max) = self.address_extent(address);
        Aabb::new(
            Vec3::new(min.x as f32, y_min, min.y as f32),
            Vec3::new(max.x as f32, y_max, max.y as f32),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> TilingScheme {
        TilingScheme::from_extent(DVec2::new(-180.0, -90.0), DVec2::new(0.0, 90.0))
    }

    #[test]
    fn test_root_tile_is_square_over_longer_side() {
        let scheme = TilingScheme::new(DVec2::new(10.0, 20.0), DVec2::new(100.0, 40.0));
        assert_eq!(scheme.base_tile_side, 100.0);
        let (min, max) = scheme.tile_to_extent(0, 0, 0);
        assert_eq!(min, DVec2::new(10.0, 20.0));
        assert_eq!(max, DVec2::new(110.0, 120.0));
    }

    #[test]
    fn test_tile_side_halves_per_level() {
        let scheme = world();
        assert_eq!(scheme.tile_side(0), 180.0);
        assert_eq!(scheme.tile_side(1), 90.0);
        assert_eq!(scheme.tile_side(3), 22.5);
    }

    #[test]
    fn test_tile_to_map_and_back() {
        let scheme = world();
        let corner = scheme.tile_to_map(3, 1, 2);
        assert_eq!(corner, DVec2::new(-180.0 + 3.0 * 45.0, -90.0 + 45.0));
        assert_eq!(scheme.map_to_tile(corner, 2), DVec2::new(3.0, 1.0));

        let inside = scheme.map_to_tile(DVec2::new(-100.0, 10.0), 1);
        assert_eq!(inside.floor(), DVec2::new(0.0, 1.0));
    }

    #[test]
    fn test_child_tiles_partition_parent() {
        let scheme = world();
        let parent = ChunkAddress::new(1, 0, 1);
        let (pmin, pmax) = scheme.address_extent(parent);
        let mut area = 0.0;
        for i in 0..4 {
            let (cmin, cmax) = scheme.address_extent(parent.child(i));
            assert!(cmin.x >= pmin.x && cmin.y >= pmin.y);
            assert!(cmax.x <= pmax.x && cmax.y <= pmax.y);
            let size = cmax - cmin;
            area += size.x * size.y;
        }
        let size = pmax - pmin;
        assert!((area - size.x * size.y).abs() < 1e-9);
    }

    #[test]
    fn test_tile_bbox_uses_xz_plane() {
        let scheme = TilingScheme::new(DVec2::ZERO, DVec2::new(64.0, 64.0));
        let bbox = scheme.tile_bbox(ChunkAddress::new(1, 1, 1), -5.0, 5.0);
        assert_eq!(bbox, Aabb::from_extents(32.0, -5.0, 32.0, 64.0, 5.0, 64.0));
    }
}
