use std::sync::{Arc, Mutex};

use crate::ops::OperatorCaches;
use crate::profile::NgramProfile;

/// Mutable per-run metadata. Written only by the driver thread (the first
/// heuristic evaluation records the original divergence); workers read.
#[derive(Debug, Clone, Default)]
pub struct ContextMeta {
    /// Byte length of the input text after normalization.
    pub original_text_length: Option<usize>,

    /// Divergence of the unedited text, recorded on the first cost
    /// evaluation.
    pub original_jsd: Option<f64>,

    /// JS-distance at which the search terminates.
    pub goal_js_dist: Option<f64>,
}

/// Shared knowledge for one obfuscation run: the target profile, the run
/// metadata, the operator working caches, and the RNG seed. Cloning is
/// cheap; all members are shared. The context is handed read-only to every
/// concurrent operator invocation.
#[derive(Clone)]
pub struct Context {
    pub target_profile: Arc<NgramProfile>,
    pub meta: Arc<Mutex<ContextMeta>>,
    pub caches: Arc<OperatorCaches>,

    /// Seed for operator randomness. `None` draws from the thread RNG,
    /// which makes runs non-deterministic.
    pub seed: Option<u64>,
}

impl Context {
    pub fn new(target_profile: Arc<NgramProfile>) -> Self {
        Self {
            target_profile,
            meta: Arc::new(Mutex::new(ContextMeta::default())),
            caches: Arc::new(OperatorCaches::default()),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn meta_lock(&self) -> std::sync::MutexGuard<'_, ContextMeta> {
        self.meta.lock().expect("context meta poisoned")
    }
}
