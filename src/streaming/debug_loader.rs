//! Placeholder chunks for exercising the streamer without real data
//!
//! Every chunk becomes a cuboid slightly smaller than its bounding box, tinted
//! by depth so neighbouring levels are easy to tell apart.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use crate::core::types::{Vec3, Vec4};
use crate::math::Aabb;
use super::loader::{ChunkLoader, ChunkLoaderFactory, ChunkPayload, LoadError};
use super::node::{ChunkAddress, ChunkInfo};

/// Depth colours, repeating past the last entry
pub const DEPTH_PALETTE: [Vec4; 6] = [
    Vec4::new(0.0, 1.0, 0.0, 1.0),
    Vec4::new(1.0, 0.0, 0.0, 1.0),
    Vec4::new(0.0, 0.0, 1.0, 1.0),
    Vec4::new(0.0, 1.0, 1.0, 1.0),
    Vec4::new(1.0, 0.0, 1.0, 1.0),
    Vec4::new(1.0, 1.0, 0.0, 1.0),
];

/// Fraction of the node box covered by its cuboid
pub const CUBOID_SCALE: f32 = 0.9;

/// Colour for chunks at `depth`
pub fn depth_color(depth: u32) -> Vec4 {
    DEPTH_PALETTE[depth as usize % DEPTH_PALETTE.len()]
}

/// Scene the debug payloads are created in
///
/// Tracks how many cuboids exist and how many are visible.
#[derive(Debug, Default)]
pub struct DebugScene {
    materialized: usize,
    live: Rc<Cell<usize>>,
    visible: Rc<Cell<usize>>,
}

impl DebugScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cuboids created since the scene started
    pub fn materialized(&self) -> usize {
        self.materialized
    }

    /// Cuboids not yet destroyed
    pub fn live_chunks(&self) -> usize {
        self.live.get()
    }

    /// Cuboids currently shown
    pub fn visible_chunks(&self) -> usize {
        self.visible.get()
    }
}

/// Depth-tinted cuboid standing in for real chunk content
#[derive(Debug)]
pub struct DebugChunk {
    pub address: ChunkAddress,
    pub bounds: Aabb,
    pub color: Vec4,
    visible: bool,
    live: Rc<Cell<usize>>,
    visible_count: Rc<Cell<usize>>,
}

impl DebugChunk {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Wireframe of the cuboid as line-list vertices
    pub fn outline(&self) -> Vec<Vec3> {
        self.bounds.line_vertices()
    }
}

impl ChunkPayload for DebugChunk {
    fn set_visible(&mut self, visible: bool) {
        if self.visible == visible {
            return;
        }
        self.visible = visible;
        let count = self.visible_count.get();
        self.visible_count.set(if visible { count + 1 } else { count.saturating_sub(1) });
    }

    fn destroy(mut self) {
        self.set_visible(false);
        self.live.set(self.live.get().saturating_sub(1));
    }
}

/// Loader that computes the cuboid for one chunk
#[derive(Debug)]
pub struct DebugChunkLoader {
    info: ChunkInfo,
    latency: Duration,
    bounds: Option<Aabb>,
}

impl ChunkLoader for DebugChunkLoader {
    type Payload = DebugChunk;
    type Context = DebugScene;

    fn load(&mut self) -> Result<(), LoadError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let center = self.info.bbox.center();
        let half = self.info.bbox.size() * (CUBOID_SCALE / 2.0);
        self.bounds = Some(Aabb::new(center - half, center + half));
        Ok(())
    }

    fn materialize(&mut self, scene: &mut DebugScene) -> Result<DebugChunk, LoadError> {
        let bounds = self
            .bounds
            .ok_or_else(|| LoadError::Materialize(format!("{:?} was never loaded", self.info.address)))?;

        scene.materialized += 1;
        scene.live.set(scene.live.get() + 1);
        Ok(DebugChunk {
            address: self.info.address,
            bounds,
            color: depth_color(self.info.address.depth),
            visible: false,
            live: Rc::clone(&scene.live),
            visible_count: Rc::clone(&scene.visible),
        })
    }
}

/// Factory for [`DebugChunkLoader`]s
#[derive(Clone, Debug, Default)]
pub struct DebugChunkLoaderFactory {
    /// Artificial delay added to every `load`
    pub latency: Duration,
}

impl DebugChunkLoaderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

impl ChunkLoaderFactory for DebugChunkLoaderFactory {
    type Loader = DebugChunkLoader;

    fn create_loader(&self, chunk: &ChunkInfo) -> DebugChunkLoader {
        DebugChunkLoader {
            info: *chunk,
            latency: self.latency,
            bounds: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(depth: u32) -> ChunkInfo {
        ChunkInfo {
            address: ChunkAddress::new(0, 0, depth),
            bbox: Aabb::from_extents(0.0, 0.0, 0.0, 10.0, 20.0, 40.0),
            error: 1.0,
        }
    }

    fn make(scene: &mut DebugScene, depth: u32) -> DebugChunk {
        let mut loader = DebugChunkLoaderFactory::new().create_loader(&info(depth));
        loader.load().unwrap();
        loader.materialize(scene).unwrap()
    }

    #[test]
    fn test_cuboid_is_scaled_around_center() {
        let mut scene = DebugScene::new();
        let chunk = make(&mut scene, 0);
        assert_eq!(chunk.bounds.center(), Vec3::new(5.0, 10.0, 20.0));
        assert!(chunk.bounds.size().abs_diff_eq(Vec3::new(9.0, 18.0, 36.0), 1e-5));
        assert_eq!(chunk.outline().len(), 24);
        chunk.destroy();
    }

    #[test]
    fn test_color_cycles_with_depth() {
        assert_eq!(depth_color(0), DEPTH_PALETTE[0]);
        assert_eq!(depth_color(6), DEPTH_PALETTE[0]);
        assert_eq!(depth_color(8), DEPTH_PALETTE[2]);
    }

    #[test]
    fn test_materialize_before_load_fails() {
        let mut scene = DebugScene::new();
        let mut loader = DebugChunkLoaderFactory::new().create_loader(&info(1));
        assert!(matches!(loader.materialize(&mut scene), Err(LoadError::Materialize(_))));
        assert_eq!(scene.materialized(), 0);
    }

    #[test]
    fn test_scene_counts_visible_and_live_chunks() {
        let mut scene = DebugScene::new();
        let mut a = make(&mut scene, 1);
        let b = make(&mut scene, 2);
        assert!(!a.is_visible(), "created hidden");
        assert_eq!(scene.live_chunks(), 2);
        assert_eq!(scene.visible_chunks(), 0);

        a.set_visible(true);
        a.set_visible(true);
        assert_eq!(scene.visible_chunks(), 1);

        a.destroy();
        b.destroy();
        assert_eq!(scene.materialized(), 2);
        assert_eq!(scene.live_chunks(), 0);
        assert_eq!(scene.visible_chunks(), 0);
    }
}
