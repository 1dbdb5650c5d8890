//! Axis-aligned bounding box

use crate::core::types::{Vec3, Vec4, Mat4};

/// Axis-aligned bounding box defined by min and max corners, in world space
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    ///
    /// # Panics
    /// Panics if `min > max` on any axis.
    pub fn new(min: Vec3, max: Vec3) -> Self {
        assert!(
            min.cmple(max).all(),
            "invalid bounding box: min {min:?} exceeds max {max:?}"
        );
        Self { min, max }
    }

    /// Create AABB from six scalars, in the order used by tile loaders
    pub fn from_extents(x_min: f32, y_min: f32, z_min: f32, x_max: f32, y_max: f32, z_max: f32) -> Self {
        Self::new(Vec3::new(x_min, y_min, z_min), Vec3::new(x_max, y_max, z_max))
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Check if two AABBs overlap on all three axes
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Euclidean distance from a point to the box surface, 0 when inside
    pub fn distance_from_point(&self, p: Vec3) -> f32 {
        let below = self.min - p;
        let above = p - self.max;
        below.max(above).max(Vec3::ZERO).length()
    }

    /// The eight corners, bit 0 = x, bit 1 = y, bit 2 = z (set = max side)
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 != 0 { self.max.x } else { self.min.x },
                if i & 2 != 0 { self.max.y } else { self.min.y },
                if i & 4 != 0 { self.max.z } else { self.min.z },
            )
        })
    }

    /// Axis-aligned bounds of the corners after projection and perspective divide
    ///
    /// This is a coarse approximation of the projected volume. Corners with
    /// `w <= 0` (behind the eye) produce meaningless coordinates; callers that
    /// need to handle those use [`crate::math::frustum::is_in_frustum`].
    pub fn clip_space_bounds(&self, view_projection: &Mat4) -> Aabb {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for corner in self.corners() {
            let clip = *view_projection * Vec4::from((corner, 1.0));
            let ndc = clip.truncate() / clip.w;
            min = min.min(ndc);
            max = max.max(ndc);
        }
        Aabb { min, max }
    }

    /// Child quadrant for quadtree subdivision in the XZ plane
    ///
    /// index: 0-3, bit 1 = upper x half, bit 0 = upper z half. The Y extent
    /// is shared with the parent.
    pub fn child_quadrant(&self, index: u8) -> Aabb {
        debug_assert!(index < 4);
        let center = self.center();
        let (x_min, x_max) = if index & 2 != 0 { (center.x, self.max.x) } else { (self.min.x, center.x) };
        let (z_min, z_max) = if index & 1 != 0 { (center.z, self.max.z) } else { (self.min.z, center.z) };
        Aabb {
            min: Vec3::new(x_min, self.min.y, z_min),
            max: Vec3::new(x_max, self.max.y, z_max),
        }
    }

    /// Endpoints of the 12 box edges as line-list vertices (24 points)
    pub fn line_vertices(&self) -> Vec<Vec3> {
        let corners = self.corners();
        let mut vertices = Vec::with_capacity(24);
        for i in 0..8usize {
            for axis_bit in [1usize, 2, 4] {
                if i & axis_bit == 0 {
                    vertices.push(corners[i]);
                    vertices.push(corners[i | axis_bit]);
                }
            }
        }
        vertices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_accessors() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(aabb.center(), Vec3::splat(0.5));
        assert_eq!(aabb.size(), Vec3::ONE);
    }

    #[test]
    #[should_panic(expected = "invalid bounding box")]
    fn test_new_rejects_inverted_box() {
        Aabb::new(Vec3::ONE, Vec3::ZERO);
    }

    #[test]
    fn test_intersects() {
        let a = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::new(Vec3::splat(0.5), Vec3::splat(1.5));
        let c = Aabb::new(Vec3::splat(2.0), Vec3::splat(3.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        // Overlap on two axes only is not an intersection
        let d = Aabb::new(Vec3::new(0.5, 0.5, 5.0), Vec3::new(1.5, 1.5, 6.0));
        assert!(!a.intersects(&d));
    }

    #[test]
    fn test_distance_from_point() {
        let aabb = Aabb::from_extents(0.0, 0.0, 0.0, 10.0, 10.0, 10.0);
        assert_eq!(aabb.distance_from_point(Vec3::splat(5.0)), 0.0);
        assert_eq!(aabb.distance_from_point(Vec3::new(15.0, 5.0, 5.0)), 5.0);
        assert_eq!(aabb.distance_from_point(Vec3::new(-3.0, 5.0, 14.0)), 5.0);
        let corner = aabb.distance_from_point(Vec3::new(11.0, 11.0, 11.0));
        assert!((corner - 3.0_f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_clip_space_bounds_identity() {
        let aabb = Aabb::from_extents(-0.5, -0.25, 0.0, 0.5, 0.25, 2.0);
        let bounds = aabb.clip_space_bounds(&Mat4::IDENTITY);
        assert_eq!(bounds, aabb);
    }

    #[test]
    fn test_clip_space_bounds_scaled() {
        let aabb = Aabb::from_extents(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);
        let bounds = aabb.clip_space_bounds(&Mat4::from_scale(Vec3::splat(4.0)));
        assert_eq!(bounds.max, Vec3::splat(4.0));
        assert_eq!(bounds.min, Vec3::ZERO);
    }

    #[test]
    fn test_child_quadrant() {
        let parent = Aabb::from_extents(0.0, -5.0, 0.0, 2.0, 5.0, 2.0);
        let q0 = parent.child_quadrant(0);
        assert_eq!(q0.min, Vec3::new(0.0, -5.0, 0.0));
        assert_eq!(q0.max, Vec3::new(1.0, 5.0, 1.0));
        let q1 = parent.child_quadrant(1);
        assert_eq!(q1.min, Vec3::new(0.0, -5.0, 1.0));
        let q2 = parent.child_quadrant(2);
        assert_eq!(q2.min, Vec3::new(1.0, -5.0, 0.0));
        let q3 = parent.child_quadrant(3);
        assert_eq!(q3.max, Vec3::new(2.0, 5.0, 2.0));
    }

    #[test]
    fn test_line_vertices() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let lines = aabb.line_vertices();
        assert_eq!(lines.len(), 24);
        for pair in lines.chunks(2) {
            // Every edge has unit length on exactly one axis
            assert!(((pair[1] - pair[0]).length() - 1.0).abs() < 1e-6);
        }
    }
}
