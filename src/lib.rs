//! Tilestream - quadtree level-of-detail chunk streaming

pub mod core;
pub mod math;
pub mod streaming;
