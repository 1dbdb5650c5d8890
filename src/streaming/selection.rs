//! Cull/refine traversal deciding which chunks to display
//!
//! The traversal reads residency state and primes the hierarchy with child
//! skeletons but does not touch loaders, payloads or queues. It reports the
//! nodes to display and the nodes whose residency should be requested, in
//! request order; the streamer applies both afterwards.
//!
//! Children are created for every visited node shallower than `max_depth`. Nodes at
//! `max_depth` stay leaves: their children could never be requested, so the
//! tree does not allocate them.

use std::time::{Duration, Instant};

use crate::core::Camera;
use crate::math::is_in_frustum;
use super::lod::chunk_screen_space_error;
use super::loader::ChunkLoader;
use super::node::{ChunkTree, NodeId};

/// Knobs of the traversal
#[derive(Clone, Copy, Debug)]
pub struct SelectionParams {
    /// Maximum allowed screen-space error in pixels
    pub tau: f32,
    /// Deepest level that gets children or residency requests
    pub max_depth: u32,
    /// Minimum time children must be loaded before they replace their parent
    pub grace_period: Duration,
}

/// Outcome of one traversal
#[derive(Clone, Debug, Default)]
pub struct Selection {
    /// Nodes to display, in traversal order
    pub active: Vec<NodeId>,
    /// Nodes to keep or make resident, in request order
    pub requests: Vec<NodeId>,
    /// Subtrees skipped by frustum culling
    pub culled: usize,
}

/// Walk the tree from the root and select the chunks to display
pub fn select_chunks<L: ChunkLoader>(
    tree: &mut ChunkTree<L>,
    camera: &Camera,
    params: &SelectionParams,
    now: Instant,
) -> Selection {
    let mut selection = Selection::default();
    let root = tree.root();
    visit(tree, root, 0, camera, params, now, &mut selection);
    selection
}

fn visit<L: ChunkLoader>(
    tree: &mut ChunkTree<L>,
    id: NodeId,
    depth: u32,
    camera: &Camera,
    params: &SelectionParams,
    now: Instant,
    selection: &mut Selection,
) {
    let (bbox, error) = {
        let node = tree.node(id);
        (*node.bbox(), node.error())
    };

    if !is_in_frustum(&bbox, &camera.view_projection) {
        selection.culled += 1;
        return;
    }

    // Primed even when this node ends up displayed
    let children = (depth < params.max_depth).then(|| tree.ensure_children_exist(id));

    // Every ancestor of a displayed chunk stays requested
    selection.requests.push(id);

    let sse = chunk_screen_space_error(&bbox, error, camera);
    if sse <= params.tau {
        selection.active.push(id);
        return;
    }

    match children {
        Some(children) if tree.all_children_resident(id, now, params.grace_period) => {
            for child in children {
                visit(tree, child, depth + 1, camera, params, now, selection);
            }
        }
        Some(children) => {
            // Too coarse, but the finer level is not ready yet
            selection.active.push(id);
            selection.requests.extend(children);
        }
        None => selection.active.push(id),
    }
}
