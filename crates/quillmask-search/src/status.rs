use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use crate::closed::ClosedList;
use crate::node::SearchNode;
use crate::open::OpenList;
use crate::operator::{Operator, OperatorStats};

/// 128-bit content digest identifying a state.
pub type StateDigest = [u8; 16];

pub type HashFn<S> = Arc<dyn Fn(&S) -> StateDigest + Send + Sync>;
pub type CostFn<S, C> = Arc<dyn Fn(&SearchNode<S>, &C) -> f64 + Send + Sync>;
pub type GoalFn<S, C> = Arc<dyn Fn(&SearchNode<S>, &C) -> bool + Send + Sync>;

/// Central input and output parameter of [`crate::astar_search`].
///
/// When the search runs on a background thread the same instance is shared
/// between the calling and the processing thread, so the counters are
/// atomic and the remaining mutable members sit behind a mutex. The handle
/// also lets the caller abort the computation cooperatively or wait for it
/// to complete.
///
/// The operator vector and the parallel stats vector are populated once
/// via [`SearchStatus::set_operators`] before the search starts and are
/// never resized afterwards; workers update the stats lock-free.
pub struct SearchStatus<S, C> {
    pub finished: AtomicBool,
    pub has_goal_state: AtomicBool,
    pub aborted_by_caller: AtomicBool,
    pub aborted_by_memguard: AtomicBool,
    pub runtime_in_millis: AtomicU64,
    pub branching_factor_min: AtomicU64,
    pub branching_factor_max: AtomicU64,
    pub init_memory_in_kbytes: AtomicU64,
    pub used_memory_in_kbytes: AtomicU64,
    pub free_memory_in_kbytes: AtomicU64,
    pub num_duplicated_states: AtomicU64,
    pub num_reopened_states: AtomicU64,
    pub num_goal_checks: AtomicU64,
    pub size_of_closed: AtomicU64,
    pub size_of_open: AtomicU64,

    pub operators: Vec<Box<dyn Operator<S, C>>>,
    pub operator_stats: Vec<OperatorStats>,

    pub compute_hash: HashFn<S>,
    pub compute_cost_h: CostFn<S, C>,
    pub is_goal_state: GoalFn<S, C>,

    // Not touched while the loop runs; move-assigned when the search ends.
    error_message: Mutex<Option<String>>,
    lists: Mutex<Option<(OpenList<S>, ClosedList<S>)>>,

    // Snapshot of the node most recently expanded plus the context,
    // updated before every callback invocation.
    snapshot: Mutex<Option<(Arc<SearchNode<S>>, C)>>,
    completion: Condvar,
}

impl<S, C> SearchStatus<S, C> {
    pub fn new(compute_hash: HashFn<S>, compute_cost_h: CostFn<S, C>, is_goal_state: GoalFn<S, C>) -> Self {
        Self {
            finished: AtomicBool::new(false),
            has_goal_state: AtomicBool::new(false),
            aborted_by_caller: AtomicBool::new(false),
            aborted_by_memguard: AtomicBool::new(false),
            runtime_in_millis: AtomicU64::new(0),
            branching_factor_min: AtomicU64::new(u64::MAX),
            branching_factor_max: AtomicU64::new(u64::MIN),
            init_memory_in_kbytes: AtomicU64::new(0),
            used_memory_in_kbytes: AtomicU64::new(0),
            free_memory_in_kbytes: AtomicU64::new(0),
            num_duplicated_states: AtomicU64::new(0),
            num_reopened_states: AtomicU64::new(0),
            num_goal_checks: AtomicU64::new(0),
            size_of_closed: AtomicU64::new(0),
            size_of_open: AtomicU64::new(0),
            operators: Vec::new(),
            operator_stats: Vec::new(),
            compute_hash,
            compute_cost_h,
            is_goal_state,
            error_message: Mutex::new(None),
            lists: Mutex::new(None),
            snapshot: Mutex::new(None),
            completion: Condvar::new(),
        }
    }

    /// Install the operator set. Allocates one stats slot per operator.
    pub fn set_operators(&mut self, operators: Vec<Box<dyn Operator<S, C>>>) {
        self.operator_stats = operators.iter().map(|_| OperatorStats::default()).collect();
        self.operators = operators;
    }

    pub fn set_current(&self, node: Arc<SearchNode<S>>, context: C) {
        *self.snapshot.lock().expect("status mutex poisoned") = Some((node, context));
    }

    pub fn current(&self) -> Option<(Arc<SearchNode<S>>, C)>
    where
        C: Clone,
    {
        self.snapshot
            .lock()
            .expect("status mutex poisoned")
            .as_ref()
            .map(|(node, context)| (Arc::clone(node), context.clone()))
    }

    pub fn num_generated_states(&self) -> u64 {
        self.operator_stats
            .iter()
            .map(|s| s.num_generated_states.load(Ordering::Relaxed))
            .sum()
    }

    pub fn num_operator_applications(&self) -> u64 {
        self.operator_stats
            .iter()
            .map(|s| s.num_applications.load(Ordering::Relaxed))
            .sum()
    }

    pub fn record_branching(&self, num_branches: usize) {
        let n = num_branches as u64;
        self.branching_factor_min.fetch_min(n, Ordering::Relaxed);
        self.branching_factor_max.fetch_max(n, Ordering::Relaxed);
    }

    pub fn record_runtime(&self, t0: Instant) {
        self.runtime_in_millis
            .store(t0.elapsed().as_millis() as u64, Ordering::Relaxed);
    }

    pub fn set_error(&self, message: String) {
        *self.error_message.lock().expect("status mutex poisoned") = Some(message);
    }

    pub fn error_message(&self) -> Option<String> {
        self.error_message
            .lock()
            .expect("status mutex poisoned")
            .clone()
    }

    pub(crate) fn store_lists(&self, open: OpenList<S>, closed: ClosedList<S>) {
        self.size_of_open.store(open.len() as u64, Ordering::Relaxed);
        self.size_of_closed.store(closed.len() as u64, Ordering::Relaxed);
        *self.lists.lock().expect("status mutex poisoned") = Some((open, closed));
    }

    /// Take ownership of the final OPEN and CLOSED lists. Only available
    /// once the search has finished.
    pub fn take_lists(&self) -> Option<(OpenList<S>, ClosedList<S>)> {
        self.lists.lock().expect("status mutex poisoned").take()
    }

    pub fn notify_one(&self) {
        let _guard = self.snapshot.lock().expect("status mutex poisoned");
        self.completion.notify_one();
    }

    /// Block until the search signals completion.
    pub fn wait_for_completion(&self) {
        let mut guard = self.snapshot.lock().expect("status mutex poisoned");
        while !self.finished.load(Ordering::SeqCst) {
            guard = self
                .completion
                .wait(guard)
                .expect("status mutex poisoned");
        }
    }
}
