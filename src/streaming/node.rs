//! Quadtree nodes and the arena that owns them
//!
//! Every node is a spatial tile with a bounding box, a geometric error and a
//! residency state. Nodes live in a [`ChunkTree`] arena and refer to each
//! other by [`NodeId`]; a node's four children are created together the first
//! time traversal reaches it and are never removed individually.

use std::time::{Duration, Instant};

use crate::math::Aabb;
use super::loader::{ChunkLoader, ChunkPayload, PayloadOf};
use super::queue::QueueEntry;

/// Stable index of a node in its [`ChunkTree`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Position in the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

/// Multi-resolution tile coordinate
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkAddress {
    pub x: u32,
    pub y: u32,
    /// Quadtree level, root = 0
    pub depth: u32,
}

impl ChunkAddress {
    pub const ROOT: ChunkAddress = ChunkAddress { x: 0, y: 0, depth: 0 };

    pub fn new(x: u32, y: u32, depth: u32) -> Self {
        Self { x, y, depth }
    }

    /// Address of child quadrant `index` (bit 1 = x half, bit 0 = y half)
    ///
    /// Coordinates fit in `u32` down to depth 32, the limit enforced through
    /// `StreamingConfig::max_depth`.
    pub fn child(&self, index: u8) -> Self {
        debug_assert!(self.depth < 32, "tile depth {} too deep to subdivide", self.depth);
        let dx = u32::from((index >> 1) & 1);
        let dy = u32::from(index & 1);
        Self {
            x: 2 * self.x + dx,
            y: 2 * self.y + dy,
            depth: self.depth + 1,
        }
    }
}

/// Snapshot of a node's geometry handed to loader factories
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ChunkInfo {
    pub address: ChunkAddress,
    pub bbox: Aabb,
    pub error: f32,
}

/// Residency of a chunk
///
/// A loader and load-queue entry exist exactly while loading, a payload and
/// replacement-queue entry exactly while loaded.
#[derive(Debug)]
pub enum ChunkState<L, P> {
    /// Structurally present only
    Skeleton,
    /// Waiting in the load queue
    Loading { loader: L, entry: QueueEntry },
    /// Payload materialized and tracked by the replacement queue
    Loaded { payload: P, entry: QueueEntry, loaded_at: Instant },
}

impl<L, P> ChunkState<L, P> {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            ChunkState::Skeleton => "skeleton",
            ChunkState::Loading { .. } => "loading",
            ChunkState::Loaded { .. } => "loaded",
        }
    }
}

/// One spatial tile of the quadtree
pub struct ChunkNode<L: ChunkLoader> {
    bbox: Aabb,
    error: f32,
    address: ChunkAddress,
    parent: Option<NodeId>,
    children: Option<[NodeId; 4]>,
    state: ChunkState<L, PayloadOf<L>>,
    bbox_tightened: bool,
    failed_attempts: u32,
    last_requested_frame: u64,
}

impl<L: ChunkLoader> ChunkNode<L> {
    fn skeleton(bbox: Aabb, error: f32, address: ChunkAddress, parent: Option<NodeId>) -> Self {
        Self {
            bbox,
            error,
            address,
            parent,
            children: None,
            state: ChunkState::Skeleton,
            bbox_tightened: false,
            failed_attempts: 0,
            last_requested_frame: 0,
        }
    }

    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }

    /// Geometric error in world units
    pub fn error(&self) -> f32 {
        self.error
    }

    pub fn address(&self) -> ChunkAddress {
        self.address
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> Option<[NodeId; 4]> {
        self.children
    }

    pub fn state(&self) -> &ChunkState<L, PayloadOf<L>> {
        &self.state
    }

    pub fn is_skeleton(&self) -> bool {
        matches!(self.state, ChunkState::Skeleton)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.state, ChunkState::Loading { .. })
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ChunkState::Loaded { .. })
    }

    /// When the node last became loaded
    pub fn loaded_at(&self) -> Option<Instant> {
        match self.state {
            ChunkState::Loaded { loaded_at, .. } => Some(loaded_at),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&PayloadOf<L>> {
        match &self.state {
            ChunkState::Loaded { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Consecutive failed loads since the last success
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Update counter of the last update that requested this node
    pub fn last_requested_frame(&self) -> u64 {
        self.last_requested_frame
    }

    pub fn info(&self) -> ChunkInfo {
        ChunkInfo {
            address: self.address,
            bbox: self.bbox,
            error: self.error,
        }
    }

    /// Loaded for at least `grace` and reported ready by the renderer
    fn is_resident_since(&self, now: Instant, grace: Duration) -> bool {
        match &self.state {
            ChunkState::Loaded { payload, loaded_at, .. } => {
                now.saturating_duration_since(*loaded_at) >= grace && payload.is_ready()
            }
            _ => false,
        }
    }
}

/// Arena owning every node of one quadtree
pub struct ChunkTree<L: ChunkLoader> {
    nodes: Vec<ChunkNode<L>>,
}

impl<L: ChunkLoader> ChunkTree<L> {
    /// Create a tree with a single skeleton root
    pub fn new(root_bbox: Aabb, root_error: f32) -> Self {
        Self {
            nodes: vec![ChunkNode::skeleton(root_bbox, root_error, ChunkAddress::ROOT, None)],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes created so far
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &ChunkNode<L> {
        &self.nodes[id.index()]
    }

    /// Iterate all nodes with their ids
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ChunkNode<L>)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId::from_index(i), node))
    }

    /// Create the four children of a node if they do not exist yet
    ///
    /// Children split the XZ extent into quadrants, share the parent's Y extent
    /// and have half its error.
    pub fn ensure_children_exist(&mut self, id: NodeId) -> [NodeId; 4] {
        if let Some(children) = self.nodes[id.index()].children {
            return children;
        }

        let (bbox, error, address) = {
            let node = &self.nodes[id.index()];
            (node.bbox, node.error, node.address)
        };

        let first = self.nodes.len();
        let children: [NodeId; 4] = std::array::from_fn(|i| NodeId::from_index(first + i));
        for i in 0..4u8 {
            self.nodes.push(ChunkNode::skeleton(
                bbox.child_quadrant(i),
                error / 2.0,
                address.child(i),
                Some(id),
            ));
        }
        self.nodes[id.index()].children = Some(children);
        children
    }

    /// All four children exist, are loaded, have been loaded for at least
    /// `grace` and have payloads the renderer reports ready
    pub fn all_children_resident(&self, id: NodeId, now: Instant, grace: Duration) -> bool {
        match self.nodes[id.index()].children {
            Some(children) => children
                .iter()
                .all(|child| self.nodes[child.index()].is_resident_since(now, grace)),
            None => false,
        }
    }

    /// Distance to the root following parent links
    pub fn depth(&self, id: NodeId) -> u32 {
        let mut depth = 0;
        let mut cursor = self.nodes[id.index()].parent;
        while let Some(parent) = cursor {
            depth += 1;
            cursor = self.nodes[parent.index()].parent;
        }
        depth
    }

    /// Skeleton -> Loading
    ///
    /// # Panics
    /// Panics if the node is not a skeleton.
    pub fn begin_loading(&mut self, id: NodeId, loader: L, entry: QueueEntry) {
        let node = &mut self.nodes[id.index()];
        assert!(
            node.is_skeleton(),
            "begin_loading on {:?} in state {}",
            node.address,
            node.state.name()
        );
        node.state = ChunkState::Loading { loader, entry };
    }

    /// Loader of a loading node
    ///
    /// # Panics
    /// Panics if the node is not loading.
    pub fn loader_mut(&mut self, id: NodeId) -> &mut L {
        let node = &mut self.nodes[id.index()];
        match &mut node.state {
            ChunkState::Loading { loader, .. } => loader,
            other => panic!("loader_mut on {:?} in state {}", node.address, other.name()),
        }
    }

    /// Loaders of every loading node, for running `load` in parallel
    pub(crate) fn loaders_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut L)> {
        self.nodes.iter_mut().enumerate().filter_map(|(i, node)| match &mut node.state {
            ChunkState::Loading { loader, .. } => Some((NodeId::from_index(i), loader)),
            _ => None,
        })
    }

    /// Loading -> Loaded, discarding the loader
    ///
    /// # Panics
    /// Panics if the node is not loading.
    pub fn finish_loading(&mut self, id: NodeId, payload: PayloadOf<L>, entry: QueueEntry, now: Instant) {
        let node = &mut self.nodes[id.index()];
        assert!(
            node.is_loading(),
            "finish_loading on {:?} in state {}",
            node.address,
            node.state.name()
        );
        node.state = ChunkState::Loaded { payload, entry, loaded_at: now };
        node.failed_attempts = 0;
    }

    /// Loading -> Skeleton without a payload, returning the loader and the
    /// load-queue entry the node held
    ///
    /// # Panics
    /// Panics if the node is not loading.
    pub fn cancel_loading(&mut self, id: NodeId) -> (L, QueueEntry) {
        let node = &mut self.nodes[id.index()];
        match std::mem::replace(&mut node.state, ChunkState::Skeleton) {
            ChunkState::Loading { loader, entry } => (loader, entry),
            other => panic!("cancel_loading on {:?} in state {}", node.address, other.name()),
        }
    }

    /// Loaded -> Skeleton, returning the payload and replacement-queue entry
    ///
    /// # Panics
    /// Panics if the node is not loaded.
    pub fn evict(&mut self, id: NodeId) -> (PayloadOf<L>, QueueEntry) {
        let node = &mut self.nodes[id.index()];
        match std::mem::replace(&mut node.state, ChunkState::Skeleton) {
            ChunkState::Loaded { payload, entry, .. } => (payload, entry),
            other => panic!("evict on {:?} in state {}", node.address, other.name()),
        }
    }

    /// Count a failed load, returning the new total
    pub(crate) fn record_load_failure(&mut self, id: NodeId) -> u32 {
        let node = &mut self.nodes[id.index()];
        node.failed_attempts += 1;
        node.failed_attempts
    }

    pub(crate) fn mark_requested(&mut self, id: NodeId, frame: u64) {
        self.nodes[id.index()].last_requested_frame = frame;
    }

    /// Mutable payload of a loaded node
    pub(crate) fn payload_mut(&mut self, id: NodeId) -> Option<&mut PayloadOf<L>> {
        match &mut self.nodes[id.index()].state {
            ChunkState::Loaded { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Replace the estimated bounds with exact ones; only the first call applies
    pub fn set_exact_bbox(&mut self, id: NodeId, bbox: Aabb) -> bool {
        let node = &mut self.nodes[id.index()];
        if node.bbox_tightened {
            log::trace!("ignoring repeated exact bbox for {:?}", node.address);
            return false;
        }
        node.bbox = bbox;
        node.bbox_tightened = true;
        true
    }
}

impl<L: ChunkLoader> Drop for ChunkTree<L> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        // Loaders and payloads must be released through the queues first
        for node in &self.nodes {
            debug_assert!(
                node.is_skeleton(),
                "chunk tree dropped with {:?} still {}",
                node.address,
                node.state.name()
            );
        }
    }
}
