//! Per-frame camera state consumed by the streamer

use crate::core::types::{Vec3, Mat4};

/// Snapshot of the viewpoint used for one streaming update
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// World position
    pub position: Vec3,
    /// Field of view in degrees
    pub fov_degrees: f32,
    /// Screen size in pixels along the axis the fov is measured on
    pub screen_size_px: u32,
    /// Combined view-projection matrix (world to clip space, GL depth range)
    pub view_projection: Mat4,
}

impl Camera {
    /// Create a camera from an existing view-projection matrix
    pub fn new(position: Vec3, fov_degrees: f32, screen_size_px: u32, view_projection: Mat4) -> Self {
        Self {
            position,
            fov_degrees,
            screen_size_px,
            view_projection,
        }
    }

    /// Create a perspective camera looking at a target
    ///
    /// Uses a right-handed view with `+Y` up and OpenGL clip depth, so clip-space
    /// coordinates of visible points fall inside `[-1, 1]^3`.
    pub fn look_at(
        position: Vec3,
        target: Vec3,
        fov_degrees: f32,
        screen_size_px: u32,
        aspect: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let up = if (target - position).normalize_or_zero().abs_diff_eq(Vec3::Y, 1e-4)
            || (target - position).normalize_or_zero().abs_diff_eq(Vec3::NEG_Y, 1e-4)
        {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        let view = Mat4::look_at_rh(position, target, up);
        let proj = Mat4::perspective_rh_gl(fov_degrees.to_radians(), aspect, near, far);
        Self::new(position, fov_degrees, screen_size_px, proj * view)
    }
}
