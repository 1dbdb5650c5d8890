//! Geometry primitives used by the streamer

pub mod aabb;
pub mod frustum;

pub use aabb::Aabb;
pub use frustum::{is_in_frustum, CLIP_CUBE};
