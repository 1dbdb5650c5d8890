//! Recency-ordered chunk queue with O(1) reordering
//!
//! Used twice by the streamer: once as the load queue (front = most urgent
//! request) and once as the replacement queue (front = most recently used,
//! back = next eviction candidate).
//!
//! Entries live in a slot array linked by index, so a node can hold its
//! [`QueueEntry`] handle and have it moved or removed without a search.
//! Freed slots are recycled through a free list; a generation counter makes
//! stale handles detectable.

use super::node::NodeId;

/// Sentinel for "no neighbour"
const NIL: u32 = u32::MAX;

/// Handle to one entry of a [`ChunkQueue`]
///
/// Returned by [`ChunkQueue::insert_front`] and valid until the entry is
/// taken or removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct QueueEntry {
    slot: u32,
    generation: u32,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    node: NodeId,
    prev: u32,
    next: u32,
    generation: u32,
    occupied: bool,
}

/// Intrusive doubly-linked list of node ids
#[derive(Debug)]
pub struct ChunkQueue {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    head: u32,
    tail: u32,
    len: usize,
}

impl Default for ChunkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ChunkQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_slots: Vec::new(),
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a node at the front, returning the handle of its entry
    pub fn insert_front(&mut self, node: NodeId) -> QueueEntry {
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                let s = &mut self.slots[slot as usize];
                s.node = node;
                s.occupied = true;
                slot
            }
            None => {
                let slot = self.slots.len() as u32;
                self.slots.push(Slot {
                    node,
                    prev: NIL,
                    next: NIL,
                    generation: 0,
                    occupied: true,
                });
                slot
            }
        };
        self.link_front(slot);
        self.len += 1;

        QueueEntry {
            slot,
            generation: self.slots[slot as usize].generation,
        }
    }

    /// Remove and return the front node
    pub fn take_front(&mut self) -> Option<NodeId> {
        (self.head != NIL).then(|| self.release(self.head))
    }

    /// Remove and return the back node
    pub fn take_back(&mut self) -> Option<NodeId> {
        (self.tail != NIL).then(|| self.release(self.tail))
    }

    /// Peek at the front node
    pub fn front(&self) -> Option<NodeId> {
        (self.head != NIL).then(|| self.slots[self.head as usize].node)
    }

    /// Peek at the back node
    pub fn back(&self) -> Option<NodeId> {
        (self.tail != NIL).then(|| self.slots[self.tail as usize].node)
    }

    /// Remove an arbitrary entry, returning its node
    ///
    /// # Panics
    /// Panics if the entry was already taken or removed.
    pub fn remove(&mut self, entry: QueueEntry) -> NodeId {
        self.check(entry);
        self.release(entry.slot)
    }

    /// Move an entry to the front without invalidating its handle
    ///
    /// # Panics
    /// Panics if the entry was already taken or removed.
    pub fn move_to_front(&mut self, entry: QueueEntry) {
        self.check(entry);
        if self.head == entry.slot {
            return;
        }
        self.unlink(entry.slot);
        self.link_front(entry.slot);
    }

    /// Node referenced by a live entry
    pub fn node(&self, entry: QueueEntry) -> NodeId {
        self.check(entry);
        self.slots[entry.slot as usize].node
    }

    /// Whether a handle still refers to a live entry
    pub fn contains(&self, entry: QueueEntry) -> bool {
        self.slots
            .get(entry.slot as usize)
            .is_some_and(|s| s.occupied && s.generation == entry.generation)
    }

    /// Iterate nodes from front to back
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let slot = &self.slots[cursor as usize];
            cursor = slot.next;
            Some(slot.node)
        })
    }

    fn check(&self, entry: QueueEntry) {
        assert!(self.contains(entry), "stale queue entry {entry:?}");
    }

    fn link_front(&mut self, slot: u32) {
        let old_head = self.head;
        {
            let s = &mut self.slots[slot as usize];
            s.prev = NIL;
            s.next = old_head;
        }
        if old_head != NIL {
            self.slots[old_head as usize].prev = slot;
        } else {
            self.tail = slot;
        }
        self.head = slot;
    }

    fn unlink(&mut self, slot: u32) {
        let Slot { prev, next, .. } = self.slots[slot as usize];
        if prev != NIL {
            self.slots[prev as usize].next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.slots[next as usize].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn release(&mut self, slot: u32) -> NodeId {
        self.unlink(slot);
        let s = &mut self.slots[slot as usize];
        s.occupied = false;
        s.prev = NIL;
        s.next = NIL;
        s.generation = s.generation.wrapping_add(1);
        let node = s.node;
        self.free_slots.push(slot);
        self.len -= 1;
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(queue: &ChunkQueue) -> Vec<u32> {
        queue.iter().map(|n| n.index() as u32).collect()
    }

    #[test]
    fn test_queue_new() {
        let queue = ChunkQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.front(), None);
        assert_eq!(queue.back(), None);
    }

    #[test]
    fn test_insert_front_order() {
        let mut queue = ChunkQueue::new();
        queue.insert_front(NodeId::from_index(1));
        queue.insert_front(NodeId::from_index(2));
        queue.insert_front(NodeId::from_index(3));

        assert_eq!(queue.len(), 3);
        assert_eq!(ids(&queue), vec![3, 2, 1]);
        assert_eq!(queue.front(), Some(NodeId::from_index(3)));
        assert_eq!(queue.back(), Some(NodeId::from_index(1)));
    }

    #[test]
    fn test_take_front_and_back() {
        let mut queue = ChunkQueue::new();
        for i in 0..4 {
            queue.insert_front(NodeId::from_index(i));
        }

        assert_eq!(queue.take_front(), Some(NodeId::from_index(3)));
        assert_eq!(queue.take_back(), Some(NodeId::from_index(0)));
        assert_eq!(ids(&queue), vec![2, 1]);
        assert_eq!(queue.take_back(), Some(NodeId::from_index(1)));
        assert_eq!(queue.take_back(), Some(NodeId::from_index(2)));
        assert_eq!(queue.take_back(), None);
        assert_eq!(queue.take_front(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_from_middle() {
        let mut queue = ChunkQueue::new();
        let _a = queue.insert_front(NodeId::from_index(1));
        let b = queue.insert_front(NodeId::from_index(2));
        let _c = queue.insert_front(NodeId::from_index(3));

        assert_eq!(queue.remove(b), NodeId::from_index(2));
        assert_eq!(ids(&queue), vec![3, 1]);
        assert!(!queue.contains(b));
    }

    #[test]
    fn test_move_to_front() {
        let mut queue = ChunkQueue::new();
        let a = queue.insert_front(NodeId::from_index(1));
        let _b = queue.insert_front(NodeId::from_index(2));
        let c = queue.insert_front(NodeId::from_index(3));

        queue.move_to_front(a);
        assert_eq!(ids(&queue), vec![1, 3, 2]);
        assert_eq!(queue.back(), Some(NodeId::from_index(2)));

        // Moving the head is a no-op, handle stays valid
        queue.move_to_front(a);
        assert_eq!(ids(&queue), vec![1, 3, 2]);
        assert_eq!(queue.node(a), NodeId::from_index(1));

        queue.move_to_front(c);
        assert_eq!(ids(&queue), vec![3, 1, 2]);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_move_tail_to_front_updates_tail() {
        let mut queue = ChunkQueue::new();
        let a = queue.insert_front(NodeId::from_index(1));
        queue.insert_front(NodeId::from_index(2));

        queue.move_to_front(a);
        assert_eq!(queue.back(), Some(NodeId::from_index(2)));
        assert_eq!(queue.take_back(), Some(NodeId::from_index(2)));
        assert_eq!(queue.take_back(), Some(NodeId::from_index(1)));
    }

    #[test]
    fn test_slots_are_recycled() {
        let mut queue = ChunkQueue::new();
        let a = queue.insert_front(NodeId::from_index(1));
        queue.remove(a);
        let b = queue.insert_front(NodeId::from_index(2));

        // Same slot, new generation: old handle stays dead
        assert!(!queue.contains(a));
        assert!(queue.contains(b));
        assert_eq!(queue.slots.len(), 1);
    }

    #[test]
    #[should_panic(expected = "stale queue entry")]
    fn test_stale_entry_panics() {
        let mut queue = ChunkQueue::new();
        let a = queue.insert_front(NodeId::from_index(1));
        queue.take_front();
        queue.move_to_front(a);
    }
}
