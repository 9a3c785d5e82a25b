use std::collections::HashMap;
use std::sync::Arc;

use crate::node::SearchNode;
use crate::status::{HashFn, StateDigest};

/// The set of already-expanded nodes, indexed by state digest.
///
/// Whole nodes are stored rather than bare digests so graph information
/// (predecessors, path reconstruction) stays available after expansion.
pub struct ClosedList<S> {
    compute_hash: HashFn<S>,
    nodes: HashMap<StateDigest, Arc<SearchNode<S>>>,
}

impl<S> ClosedList<S> {
    pub fn new(compute_hash: HashFn<S>) -> Self {
        Self {
            compute_hash,
            nodes: HashMap::new(),
        }
    }

    /// Returns false if a node with the same state was already present.
    pub fn put(&mut self, node: Arc<SearchNode<S>>) -> bool {
        let digest = (self.compute_hash)(node.state());
        match self.nodes.entry(digest) {
            std::collections::hash_map::Entry::Occupied(_) => false,
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(node);
                true
            }
        }
    }

    /// Remove the entry matching the state of `node`, if any.
    pub fn pop(&mut self, node: &SearchNode<S>) {
        self.nodes.remove(&(self.compute_hash)(node.state()));
    }

    pub fn get(&self, state: &S) -> Option<Arc<SearchNode<S>>> {
        self.nodes.get(&(self.compute_hash)(state)).cloned()
    }

    pub fn contains(&self, state: &S) -> bool {
        self.nodes.contains_key(&(self.compute_hash)(state))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SearchNode<S>>> {
        self.nodes.values()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Clear the list but keep the ancestor chains of the parents of the
    /// given nodes. The given nodes themselves are expected to live on the
    /// OPEN list and are not retained here.
    ///
    /// This bounds memory growth while keeping solution paths
    /// reconstructable: OPEN still holds the top-level nodes, and their
    /// parent chains remain reachable through the retained entries.
    pub fn retain_parent_chains<'a, I>(&mut self, keep: I)
    where
        S: 'a,
        I: IntoIterator<Item = &'a Arc<SearchNode<S>>>,
    {
        let mut kept = HashMap::new();
        for node in keep {
            let mut current = node.parent().cloned();
            while let Some(ancestor) = current {
                kept.insert((self.compute_hash)(ancestor.state()), Arc::clone(&ancestor));
                current = ancestor.parent().cloned();
            }
        }
        self.nodes = kept;
    }
}
