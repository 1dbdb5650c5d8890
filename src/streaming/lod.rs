//! Screen-space error metric for LOD refinement
//!
//! A chunk carries a geometric error in world units. Seen from the camera,
//! that error spans some number of pixels; when it spans more than `tau`
//! pixels the chunk is too coarse and its children should be shown instead.

use crate::core::Camera;
use crate::math::Aabb;

/// Project a world-space error to pixels using similar triangles
///
/// `error / frustum_width_at_distance == sse / screen_size`, with
/// `frustum_width_at_distance = 2 * distance * tan(fov / 2)`.
///
/// A camera touching or inside the chunk (`distance <= 0`) sees an infinite
/// error unless the error itself is zero.
///
/// # Examples
/// ```
/// use tilestream::streaming::lod::screen_space_error;
///
/// // 90 degree fov: frustum width at distance 10 is 20 world units
/// let sse = screen_space_error(1.0, 10.0, 800.0, 90.0);
/// assert!((sse - 40.0).abs() < 1e-3);
/// assert_eq!(screen_space_error(1.0, 0.0, 800.0, 90.0), f32::INFINITY);
/// ```
pub fn screen_space_error(error: f32, distance: f32, screen_size_px: f32, fov_degrees: f32) -> f32 {
    if error <= 0.0 {
        return 0.0;
    }
    if distance <= 0.0 {
        return f32::INFINITY;
    }
    let half_fov = (fov_degrees * std::f32::consts::PI / 360.0).tan();
    error * screen_size_px / (2.0 * distance * half_fov)
}

/// Screen-space error of a chunk with the given bounds and error
pub fn chunk_screen_space_error(bbox: &Aabb, error: f32, camera: &Camera) -> f32 {
    let distance = bbox.distance_from_point(camera.position);
    screen_space_error(error, distance, camera.screen_size_px as f32, camera.fov_degrees)
}
