use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::debug;

use crate::closed::ClosedList;
use crate::memory;
use crate::node::SearchNode;
use crate::open::{OpenList, PushOutcome};
use crate::status::SearchStatus;

/// Probe returning free system memory in kilobytes. Overridable so tests
/// can simulate memory pressure.
pub type MemoryProbe = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Tuning parameters for a single search run.
#[derive(Clone)]
pub struct SearchOptions {
    /// Snapshot the status and invoke the callback every n-th goal check.
    pub status_update_interval: u64,

    /// Abort the computation when free system memory falls below this
    /// limit.
    pub free_memory_limit_in_mbytes: u64,

    /// Prune OPEN and CLOSED once OPEN grows past this size.
    pub max_open_size: usize,

    /// Number of frontier nodes retained by a prune.
    pub prune_keep_open: usize,

    /// Override for the free-memory probe. `None` queries the system.
    pub memory_probe: Option<MemoryProbe>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            status_update_interval: 100,
            free_memory_limit_in_mbytes: 1000,
            max_open_size: 40_000,
            prune_keep_open: 10,
            memory_probe: None,
        }
    }
}

/// A callback that does nothing, for callers that don't want progress
/// reports.
pub fn null_callback<S, C>(_status: &SearchStatus<S, C>) {}

/// Apply every operator to the current node in parallel and wrap the
/// results as child nodes. One worker task per operator; each task records
/// its operator's stats. The returned nodes may contain duplicates, which
/// the main loop resolves against OPEN and CLOSED.
fn generate_successor_nodes<S, C>(
    status: &SearchStatus<S, C>,
    node: &Arc<SearchNode<S>>,
    context: &C,
) -> Vec<SearchNode<S>>
where
    S: Send + Sync,
    C: Send + Sync,
{
    debug_assert_eq!(status.operators.len(), status.operator_stats.len());

    let results: Vec<(usize, Vec<S>)> = status
        .operators
        .par_iter()
        .enumerate()
        .map(|(i, op)| {
            let t0 = Instant::now();
            let states = op.apply(node.state(), context);

            let stats = &status.operator_stats[i];
            stats
                .runtime_in_micros
                .fetch_add(t0.elapsed().as_micros() as u64, Ordering::Relaxed);
            stats
                .num_generated_states
                .fetch_add(states.len() as u64, Ordering::Relaxed);
            stats.num_applications.fetch_add(1, Ordering::Relaxed);

            (i, states)
        })
        .collect();

    let mut new_nodes = Vec::new();
    for (i, states) in results {
        let opcost = status.operators[i].cost() as f32;
        for state in states {
            new_nodes.push(SearchNode::new_child(state, Arc::clone(node), i as u8, opcost));
        }
    }
    new_nodes
}

/// Run the best-first search to completion on the calling thread.
///
/// The status handle is both input and output: it supplies the hash, cost,
/// and goal functions plus the operator set and the initial node/context
/// snapshot, and it receives all progress counters, the termination flags,
/// and the final OPEN/CLOSED lists. Any panic raised inside the loop is
/// captured into `error_message`; `finished` is set and the completion
/// condvar signalled on every exit path.
pub fn astar_search<S, C, F>(status: &Arc<SearchStatus<S, C>>, callback: F, options: &SearchOptions)
where
    S: Clone + Send + Sync,
    C: Clone + Send + Sync,
    F: Fn(&SearchStatus<S, C>),
{
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        run_search(status, &callback, options);
    }));

    if let Err(payload) = result {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "search loop panicked".to_string());
        status.set_error(message);
    }

    status.finished.store(true, Ordering::SeqCst);
    status.notify_one();
}

fn run_search<S, C, F>(status: &Arc<SearchStatus<S, C>>, callback: &F, options: &SearchOptions)
where
    S: Clone + Send + Sync,
    C: Clone + Send + Sync,
    F: Fn(&SearchStatus<S, C>),
{
    let t0 = Instant::now();

    let mut open = OpenList::new(Arc::clone(&status.compute_hash));
    let mut closed = ClosedList::new(Arc::clone(&status.compute_hash));

    let (initial, context) = status
        .current()
        .expect("initial node and context must be set before the search starts");

    let mut root = (*initial).clone();
    let h = (status.compute_cost_h)(&root, &context) as f32;
    root.set_cost_h(h);
    let mut node = Arc::new(root);
    open.push_or_update(Arc::clone(&node));

    while !open.is_empty() {
        node = open.pop().expect("OPEN is non-empty");
        closed.put(Arc::clone(&node));

        status.size_of_open.store(open.len() as u64, Ordering::Relaxed);
        status
            .size_of_closed
            .store(closed.len() as u64, Ordering::Relaxed);

        if status.num_goal_checks.load(Ordering::Relaxed) % options.status_update_interval == 0 {
            status.set_current(Arc::clone(&node), context.clone());
            record_memory_usage(status, options);
            status.record_runtime(t0);
            callback(status);

            let free_memory_limit_in_kbytes = options.free_memory_limit_in_mbytes * 1024;
            if status.free_memory_in_kbytes.load(Ordering::Relaxed) < free_memory_limit_in_kbytes {
                status.aborted_by_memguard.store(true, Ordering::SeqCst);
            }
        }

        status.num_goal_checks.fetch_add(1, Ordering::Relaxed);
        if (status.is_goal_state)(&node, &context) {
            status.has_goal_state.store(true, Ordering::SeqCst);
            break;
        }

        if status.aborted_by_memguard.load(Ordering::SeqCst)
            || status.aborted_by_caller.load(Ordering::SeqCst)
        {
            break;
        }

        let new_nodes = generate_successor_nodes(status, &node, &context);
        status.record_branching(new_nodes.len());

        for mut child in new_nodes {
            if let Some(closed_node) = closed.get(child.state()) {
                if child.cost_g() < closed_node.cost_g() {
                    // A cheaper path to an already-expanded state: reopen.
                    closed.pop(&closed_node);
                    open.push_or_update(Arc::new(child));
                    status.num_reopened_states.fetch_add(1, Ordering::Relaxed);
                } else {
                    status.num_duplicated_states.fetch_add(1, Ordering::Relaxed);
                }
            } else {
                let h = (status.compute_cost_h)(&child, &context) as f32;
                child.set_cost_h(h);
                match open.push_or_update(Arc::new(child)) {
                    PushOutcome::Duplicate => {
                        status.num_duplicated_states.fetch_add(1, Ordering::Relaxed);
                    }
                    PushOutcome::Inserted => {
                        if open.len() > options.max_open_size {
                            debug!(
                                open = open.len(),
                                closed = closed.len(),
                                keep = options.prune_keep_open,
                                "pruning OPEN and CLOSED"
                            );
                            // OPEN must be pruned first so CLOSED can walk
                            // the surviving frontier's parent chains.
                            open.clear_keep(options.prune_keep_open);
                            closed.retain_parent_chains(open.iter());
                        }
                    }
                    PushOutcome::Updated => {}
                }
            }
        }
    }

    status.store_lists(open, closed);
    status.set_current(Arc::clone(&node), context.clone());
    record_memory_usage(status, options);
    status.record_runtime(t0);
}

fn record_memory_usage<S, C>(status: &SearchStatus<S, C>, options: &SearchOptions) {
    let free = options
        .memory_probe
        .as_ref()
        .map(|probe| probe())
        .unwrap_or_else(memory::free_memory_in_kbytes);
    status.free_memory_in_kbytes.store(free, Ordering::Relaxed);
    status
        .used_memory_in_kbytes
        .store(memory::used_memory_in_kbytes(), Ordering::Relaxed);
}

/// Run the search on a detached background thread and return immediately.
/// The status handle can then be polled, or waited on via
/// [`SearchStatus::wait_for_completion`].
pub fn astar_search_async<S, C, F>(
    status: Arc<SearchStatus<S, C>>,
    callback: F,
    options: SearchOptions,
) where
    S: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
    F: Fn(&SearchStatus<S, C>) + Send + 'static,
{
    std::thread::spawn(move || astar_search(&status, callback, &options));
}
