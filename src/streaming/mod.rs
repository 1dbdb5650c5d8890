//! Quadtree LOD streaming: chunk selection, loading and eviction

pub mod config;
pub mod debug_loader;
pub mod loader;
pub mod lod;
pub mod node;
pub mod queue;
pub mod selection;
pub mod streamer;
pub mod tiling;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{StreamingConfig, DEFAULT_GRACE_PERIOD_MS, DEFAULT_MAX_RESIDENT_CHUNKS, MAX_DEPTH_LIMIT};
pub use debug_loader::{DebugChunk, DebugChunkLoader, DebugChunkLoaderFactory, DebugScene};
pub use loader::{ChunkLoader, ChunkLoaderFactory, ChunkPayload, ContextOf, LoadError, PayloadOf};
pub use lod::{chunk_screen_space_error, screen_space_error};
pub use node::{ChunkAddress, ChunkInfo, ChunkNode, ChunkState, ChunkTree, NodeId};
pub use queue::{ChunkQueue, QueueEntry};
pub use selection::{select_chunks, Selection, SelectionParams};
pub use streamer::{ChunkedStreamer, UpdateStats};
pub use tiling::TilingScheme;
