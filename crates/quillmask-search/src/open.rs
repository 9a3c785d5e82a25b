use std::collections::HashMap;
use std::sync::Arc;

use crate::node::SearchNode;
use crate::status::{HashFn, StateDigest};

/// Outcome of [`OpenList::push_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// No node with this state was present; the node was inserted.
    Inserted,
    /// A node with this state was present with a higher cost g and was
    /// replaced by the new node.
    Updated,
    /// A node with this state was present with an equal or lower cost g;
    /// nothing changed.
    Duplicate,
}

/// The frontier of the search: a priority queue ordered by cost f
/// (lowest first) with O(1) lookup by state digest so the same state can
/// never be queued twice.
///
/// The heap is managed manually instead of through `BinaryHeap` because
/// updating a queued node's cost requires replacing it in place and then
/// restoring heap order globally, which `BinaryHeap` does not allow.
pub struct OpenList<S> {
    compute_hash: HashFn<S>,
    heap: Vec<Arc<SearchNode<S>>>,
    map: HashMap<StateDigest, Arc<SearchNode<S>>>,
}

impl<S> OpenList<S> {
    pub fn new(compute_hash: HashFn<S>) -> Self {
        Self {
            compute_hash,
            heap: Vec::new(),
            map: HashMap::new(),
        }
    }

    /// Remove and return the node with the lowest cost f.
    pub fn pop(&mut self) -> Option<Arc<SearchNode<S>>> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let popped = self.heap.pop().expect("heap is non-empty");
        self.sift_down(0);
        self.map.remove(&(self.compute_hash)(popped.state()));
        Some(popped)
    }

    /// Insert a node, or replace an existing entry for the same state when
    /// the new node carries a strictly lower cost g.
    pub fn push_or_update(&mut self, node: Arc<SearchNode<S>>) -> PushOutcome {
        let digest = (self.compute_hash)(node.state());

        if let Some(existing) = self.map.get(&digest) {
            if existing.cost_g() <= node.cost_g() {
                return PushOutcome::Duplicate;
            }
            let old = Arc::clone(existing);
            let idx = self
                .heap
                .iter()
                .position(|n| Arc::ptr_eq(n, &old))
                .expect("map entry must be present in the heap");
            self.heap[idx] = Arc::clone(&node);
            self.map.insert(digest, node);
            self.rebuild();
            return PushOutcome::Updated;
        }

        self.map.insert(digest, Arc::clone(&node));
        self.heap.push(node);
        let last = self.heap.len() - 1;
        self.sift_up(last);
        PushOutcome::Inserted
    }

    pub fn contains(&self, state: &S) -> bool {
        self.map.contains_key(&(self.compute_hash)(state))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SearchNode<S>>> {
        self.heap.iter()
    }

    /// Drop everything but the `keep` most promising nodes.
    pub fn clear_keep(&mut self, keep: usize) {
        if self.heap.is_empty() {
            return;
        }
        let mut kept_heap = Vec::with_capacity(keep);
        let mut kept_map = HashMap::with_capacity(keep);
        for _ in 0..keep {
            let Some(node) = self.pop() else { break };
            kept_map.insert((self.compute_hash)(node.state()), Arc::clone(&node));
            kept_heap.push(node);
        }
        self.heap = kept_heap;
        self.map = kept_map;
        self.rebuild();
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.heap[a].cost_f() < self.heap[b].cost_f()
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.less(idx, parent) {
                break;
            }
            self.heap.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut smallest = idx;
            if left < len && self.less(left, smallest) {
                smallest = left;
            }
            if right < len && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.heap.swap(idx, smallest);
            idx = smallest;
        }
    }

    fn rebuild(&mut self) {
        let len = self.heap.len();
        for idx in (0..len / 2).rev() {
            self.sift_down(idx);
        }
    }
}
