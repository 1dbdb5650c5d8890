//! Loader capabilities supplied by the embedding application
//!
//! The streamer never performs I/O or builds geometry itself. For every chunk
//! it decides to stream in, it asks a [`ChunkLoaderFactory`] for a loader,
//! runs [`ChunkLoader::load`] (the slow part, safe to run off-thread) and then
//! [`ChunkLoader::materialize`] on the owning thread to obtain a payload the
//! renderer can show or hide.

use thiserror::Error;

use crate::math::Aabb;
use super::node::ChunkInfo;

/// Failure while acquiring or materializing chunk data
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("chunk data unavailable: {0}")]
    Unavailable(String),

    #[error("chunk data corrupt: {0}")]
    Corrupt(String),

    #[error("materialization failed: {0}")]
    Materialize(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Renderable unit owned by the external rendering system
pub trait ChunkPayload {
    /// Show or hide the payload. Payloads start hidden.
    fn set_visible(&mut self, visible: bool);

    /// Whether the renderer has finished preparing this payload (e.g. GPU upload)
    fn is_ready(&self) -> bool {
        true
    }

    /// Release the payload when its chunk is evicted
    fn destroy(self)
    where
        Self: Sized,
    {
    }
}

/// Loader bound to a single chunk
pub trait ChunkLoader: Send {
    /// Payload produced by [`materialize`](Self::materialize)
    type Payload: ChunkPayload;
    /// Rendering context the payload is created in
    type Context;

    /// Acquire the chunk data. Must not touch the tree or the queues.
    fn load(&mut self) -> Result<(), LoadError>;

    /// Bind the acquired data into a payload. Called after a successful `load`.
    fn materialize(&mut self, context: &mut Self::Context) -> Result<Self::Payload, LoadError>;

    /// Exact bounds of the chunk, once known from the loaded data
    fn exact_bbox(&self) -> Option<Aabb> {
        None
    }
}

/// Creates a loader for a skeleton chunk
pub trait ChunkLoaderFactory {
    type Loader: ChunkLoader;

    fn create_loader(&self, chunk: &ChunkInfo) -> Self::Loader;
}

/// Payload type produced by a loader
pub type PayloadOf<L> = <L as ChunkLoader>::Payload;

/// Rendering context type consumed by a factory's loaders
pub type ContextOf<F> = <<F as ChunkLoaderFactory>::Loader as ChunkLoader>::Context;
