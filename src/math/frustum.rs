//! Coarse frustum culling in clip space

use crate::core::types::{Vec3, Vec4, Mat4};
use super::aabb::Aabb;

/// The canonical view volume after perspective divide
pub const CLIP_CUBE: Aabb = Aabb {
    min: Vec3::splat(-1.0),
    max: Vec3::splat(1.0),
};

/// Check whether a world-space box may be visible
///
/// The eight corners are projected and their clip-space bounds tested against
/// [`CLIP_CUBE`]. This errs toward "visible": a rotated box projects to a
/// larger axis-aligned area, and a box straddling the eye plane is always
/// reported visible. A box entirely behind the eye is culled.
pub fn is_in_frustum(bbox: &Aabb, view_projection: &Mat4) -> bool {
    let clip: [Vec4; 8] = bbox
        .corners()
        .map(|corner| *view_projection * Vec4::from((corner, 1.0)));

    let behind = clip.iter().filter(|c| c.w <= f32::EPSILON).count();
    if behind == clip.len() {
        return false;
    }
    if behind > 0 {
        return true;
    }

    CLIP_CUBE.intersects(&bbox.clip_space_bounds(view_projection))
}
