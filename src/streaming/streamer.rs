//! Streaming orchestrator for a quadtree of chunks
//!
//! Each update walks the tree against the camera, keeps the chunks it needs
//! resident, shows and hides payloads, trims the replacement queue to the
//! configured budget and finally drains the load queue.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use rayon::prelude::*;

use crate::core::{Camera, Result};
use crate::math::Aabb;
use super::config::StreamingConfig;
use super::loader::{ChunkLoader, ChunkLoaderFactory, ChunkPayload, ContextOf};
use super::node::{ChunkState, ChunkTree, NodeId};
use super::queue::ChunkQueue;
use super::selection::{select_chunks, SelectionParams};

/// Counters from the most recent update
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Update counter, starting at 1
    pub frame: u64,
    /// Nodes selected for display
    pub active: usize,
    /// Payloads made visible this update
    pub shown: usize,
    /// Payloads hidden this update
    pub hidden: usize,
    /// Subtrees skipped by frustum culling
    pub culled: usize,
    /// Skeleton nodes newly queued for loading
    pub requested: usize,
    /// Loads completed while draining the queue
    pub loads_completed: usize,
    /// Loads that failed while draining the queue
    pub loads_failed: usize,
    /// Chunks evicted to stay within budget
    pub evicted: usize,
    /// Evicted chunks that had been requested during this update
    pub thrashed: usize,
    /// Load queue length when the update returned
    pub loading: usize,
    /// Replacement queue length when the update returned
    pub resident: usize,
}

/// Level-of-detail streaming cache over a quadtree of chunks
pub struct ChunkedStreamer<F: ChunkLoaderFactory> {
    config: StreamingConfig,
    tree: ChunkTree<F::Loader>,
    /// Chunks waiting for data, most urgent first
    load_queue: ChunkQueue,
    /// Loaded chunks, most recently used first
    replacement_queue: ChunkQueue,
    factory: F,
    context: ContextOf<F>,
    /// Nodes selected by the last traversal
    active: Vec<NodeId>,
    /// Active nodes whose payload is currently visible
    shown: HashSet<NodeId>,
    needs_update: bool,
    frame: u64,
    stats: UpdateStats,
}

impl<F: ChunkLoaderFactory> ChunkedStreamer<F> {
    /// Create a streamer with a single skeleton root
    ///
    /// `context` is passed to [`ChunkLoader::materialize`] for every payload.
    pub fn new(
        config: StreamingConfig,
        root_bbox: Aabb,
        root_error: f32,
        factory: F,
        context: ContextOf<F>,
    ) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Chunked streamer: root {:?}..{:?}, error {}, tau {}, max depth {}, budget {} chunks",
            root_bbox.min,
            root_bbox.max,
            root_error,
            config.tau,
            config.max_depth,
            config.max_resident_chunks
        );

        Ok(Self {
            config,
            tree: ChunkTree::new(root_bbox, root_error),
            load_queue: ChunkQueue::new(),
            replacement_queue: ChunkQueue::new(),
            factory,
            context,
            active: Vec::new(),
            shown: HashSet::new(),
            needs_update: false,
            frame: 0,
            stats: UpdateStats::default(),
        })
    }

    /// Run one full update for the current time
    ///
    /// Each chunk drained by this call is stamped with the time it finished
    /// materializing, so slow loads still serve the full grace period.
    pub fn update(&mut self, camera: &Camera) {
        self.update_selection(camera, Instant::now());
        self.drain_load_queue(Instant::now);
        self.log_update();
    }

    /// Run one full update as of `now`
    ///
    /// Every chunk loaded by this call is stamped with `now`.
    pub fn update_at(&mut self, camera: &Camera, now: Instant) {
        self.update_selection(camera, now);
        self.drain_load_queue(|| now);
        self.log_update();
    }

    fn log_update(&self) {
        let s = &self.stats;
        log::debug!(
            "update {}: active {} shown {} hidden {} | culled {} | requested {} loading {} resident {} | evicted {} (thrashed {}) | loaded {} failed {}",
            s.frame,
            s.active,
            s.shown,
            s.hidden,
            s.culled,
            s.requested,
            s.loading,
            s.resident,
            s.evicted,
            s.thrashed,
            s.loads_completed,
            s.loads_failed
        );
    }

    /// Traverse, request residency, update visibility and enforce the budget
    ///
    /// Does not run any loader; see [`process_load_queue`](Self::process_load_queue).
    pub fn update_selection(&mut self, camera: &Camera, now: Instant) {
        self.frame += 1;
        self.needs_update = false;
        self.stats = UpdateStats {
            frame: self.frame,
            ..Default::default()
        };

        let params = SelectionParams {
            tau: self.config.tau,
            max_depth: self.config.max_depth,
            grace_period: self.config.grace_period(),
        };
        let selection = select_chunks(&mut self.tree, camera, &params, now);

        for &id in &selection.requests {
            self.request_residency(id);
        }
        self.stats.culled = selection.culled;
        self.apply_active_set(selection.active);
        self.enforce_capacity();

        self.stats.loading = self.load_queue.len();
        self.stats.resident = self.replacement_queue.len();
    }

    /// Load and materialize every queued chunk, front to back, stamping
    /// each with `now`
    ///
    /// Returns the number of chunks that became loaded. The budget is enforced
    /// again afterwards, so it holds when this returns.
    pub fn process_load_queue(&mut self, now: Instant) -> usize {
        self.drain_load_queue(|| now)
    }

    /// Same as [`process_load_queue`](Self::process_load_queue), reading the
    /// load time of each chunk from `clock` once its payload exists
    pub fn drain_load_queue(&mut self, mut clock: impl FnMut() -> Instant) -> usize {
        let mut preloaded: HashMap<NodeId, std::result::Result<(), _>> = HashMap::new();
        if self.config.parallel_loads && self.load_queue.len() > 1 {
            let loaders: Vec<_> = self.tree.loaders_mut().collect();
            preloaded = loaders
                .into_par_iter()
                .map(|(id, loader)| (id, loader.load()))
                .collect();
        }

        let mut completed = 0;
        let mut failed = 0;
        while let Some(id) = self.load_queue.take_front() {
            let loaded = match preloaded.remove(&id) {
                Some(result) => result,
                None => self.tree.loader_mut(id).load(),
            };
            let outcome = loaded.and_then(|()| {
                let loader = self.tree.loader_mut(id);
                let exact = loader.exact_bbox();
                loader
                    .materialize(&mut self.context)
                    .map(|payload| (payload, exact))
            });

            match outcome {
                Ok((payload, exact)) => {
                    if let Some(bbox) = exact {
                        self.tree.set_exact_bbox(id, bbox);
                    }
                    let entry = self.replacement_queue.insert_front(id);
                    self.tree.finish_loading(id, payload, entry, clock());
                    completed += 1;
                    self.needs_update = true;
                }
                Err(err) => {
                    let (_loader, entry) = self.tree.cancel_loading(id);
                    debug_assert!(!self.load_queue.contains(entry));
                    let attempts = self.tree.record_load_failure(id);
                    let address = self.tree.node(id).address();
                    if attempts >= self.config.max_load_attempts {
                        log::warn!(
                            "Giving up on chunk {:?} after {} failed loads: {}",
                            address, attempts, err
                        );
                    } else {
                        log::warn!("Failed to load chunk {:?} (attempt {}): {}", address, attempts, err);
                    }
                    failed += 1;
                }
            }
        }

        self.stats.loads_completed += completed;
        self.stats.loads_failed += failed;
        self.enforce_capacity();
        self.stats.loading = self.load_queue.len();
        self.stats.resident = self.replacement_queue.len();
        completed
    }

    /// Make sure a chunk will be loaded soon, or stays loaded
    ///
    /// Loaded and loading chunks move to the front of their queue. A skeleton
    /// gets a fresh loader and a load-queue entry, unless it has failed
    /// `max_load_attempts` times. Returns whether the chunk is now resident or
    /// queued.
    pub fn request_residency(&mut self, id: NodeId) -> bool {
        self.tree.mark_requested(id, self.frame);
        match self.tree.node(id).state() {
            ChunkState::Loaded { entry, .. } => {
                self.replacement_queue.move_to_front(*entry);
                true
            }
            ChunkState::Loading { entry, .. } => {
                self.load_queue.move_to_front(*entry);
                true
            }
            ChunkState::Skeleton => {
                let node = self.tree.node(id);
                if node.failed_attempts() >= self.config.max_load_attempts {
                    return false;
                }
                let loader = self.factory.create_loader(&node.info());
                let entry = self.load_queue.insert_front(id);
                self.tree.begin_loading(id, loader, entry);
                self.stats.requested += 1;
                true
            }
        }
    }

    /// Evict least recently used chunks until the budget holds
    ///
    /// Returns the number of evicted chunks.
    pub fn enforce_capacity(&mut self) -> usize {
        let mut evicted = 0;
        while self.replacement_queue.len() > self.config.max_resident_chunks {
            let Some(id) = self.replacement_queue.take_back() else {
                break;
            };
            if self.frame != 0 && self.tree.node(id).last_requested_frame() == self.frame {
                self.stats.thrashed += 1;
                log::warn!(
                    "Evicting chunk {:?} requested in this update; budget of {} chunks is below the working set",
                    self.tree.node(id).address(),
                    self.config.max_resident_chunks
                );
            }
            self.release_payload(id);
            evicted += 1;
        }
        self.stats.evicted += evicted;
        evicted
    }

    /// Evict a loaded chunk right away
    ///
    /// # Panics
    /// Panics if the chunk is not loaded.
    pub fn evict(&mut self, id: NodeId) {
        let entry = match self.tree.node(id).state() {
            ChunkState::Loaded { entry, .. } => *entry,
            other => panic!("evict on {:?} in state {}", self.tree.node(id).address(), other.name()),
        };
        self.replacement_queue.remove(entry);
        self.release_payload(id);
    }

    /// Cancel every pending load and evict every loaded chunk
    ///
    /// Leaves the whole tree as skeletons. Also run on drop.
    pub fn shutdown(&mut self) {
        let mut cancelled = 0;
        while let Some(id) = self.load_queue.take_front() {
            let (_loader, entry) = self.tree.cancel_loading(id);
            debug_assert!(!self.load_queue.contains(entry));
            cancelled += 1;
        }
        let mut unloaded = 0;
        while let Some(id) = self.replacement_queue.take_back() {
            self.release_payload(id);
            unloaded += 1;
        }
        self.active.clear();
        self.shown.clear();
        self.needs_update = false;

        if cancelled + unloaded > 0 {
            log::debug!("Streamer shutdown: cancelled {} loads, unloaded {} chunks", cancelled, unloaded);
        }
    }

    /// Panic if node state and queue membership disagree anywhere
    pub fn check_invariants(&self) {
        let mut loading = 0;
        let mut loaded = 0;
        for (id, node) in self.tree.iter() {
            match node.state() {
                ChunkState::Skeleton => {}
                ChunkState::Loading { entry, .. } => {
                    loading += 1;
                    assert!(
                        self.load_queue.contains(*entry) && self.load_queue.node(*entry) == id,
                        "loading chunk {:?} has no matching load-queue entry",
                        node.address()
                    );
                }
                ChunkState::Loaded { entry, .. } => {
                    loaded += 1;
                    assert!(
                        self.replacement_queue.contains(*entry) && self.replacement_queue.node(*entry) == id,
                        "loaded chunk {:?} has no matching replacement-queue entry",
                        node.address()
                    );
                }
            }
            if let Some(children) = node.children() {
                for child in children {
                    let child_node = self.tree.node(child);
                    assert_eq!(child_node.parent(), Some(id), "broken parent link");
                    assert_eq!(child_node.address().depth, node.address().depth + 1);
                }
            }
        }
        assert_eq!(loading, self.load_queue.len(), "load queue holds foreign entries");
        assert_eq!(loaded, self.replacement_queue.len(), "replacement queue holds foreign entries");
        for id in &self.shown {
            assert!(self.tree.node(*id).is_loaded(), "shown chunk without payload");
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn tree(&self) -> &ChunkTree<F::Loader> {
        &self.tree
    }

    #[cfg(test)]
    pub(crate) fn tree_mut(&mut self) -> &mut ChunkTree<F::Loader> {
        &mut self.tree
    }

    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// Nodes selected for display by the last update
    pub fn active_nodes(&self) -> &[NodeId] {
        &self.active
    }

    /// Active nodes whose payload is visible
    pub fn shown_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.shown.iter().copied()
    }

    pub fn is_shown(&self, id: NodeId) -> bool {
        self.shown.contains(&id)
    }

    /// A load completed during the last update; call `update` again soon
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub fn load_queue(&self) -> &ChunkQueue {
        &self.load_queue
    }

    pub fn replacement_queue(&self) -> &ChunkQueue {
        &self.replacement_queue
    }

    pub fn load_queue_len(&self) -> usize {
        self.load_queue.len()
    }

    pub fn resident_count(&self) -> usize {
        self.replacement_queue.len()
    }

    /// Number of updates run so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn last_stats(&self) -> &UpdateStats {
        &self.stats
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    pub fn context(&self) -> &ContextOf<F> {
        &self.context
    }

    fn apply_active_set(&mut self, active: Vec<NodeId>) {
        let mut shown = HashSet::with_capacity(active.len());
        for &id in &active {
            if let Some(payload) = self.tree.payload_mut(id) {
                if !self.shown.contains(&id) {
                    payload.set_visible(true);
                    self.stats.shown += 1;
                }
                shown.insert(id);
            }
        }

        // Hidden, not destroyed: they stay cached until evicted
        for &id in self.shown.difference(&shown) {
            if let Some(payload) = self.tree.payload_mut(id) {
                payload.set_visible(false);
                self.stats.hidden += 1;
            }
        }

        self.shown = shown;
        self.stats.active = active.len();
        self.active = active;
    }

    fn release_payload(&mut self, id: NodeId) {
        self.shown.remove(&id);
        let (payload, _entry) = self.tree.evict(id);
        payload.destroy();
    }
}

impl<F: ChunkLoaderFactory> Drop for ChunkedStreamer<F> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        self.shutdown();
    }
}
