use std::sync::atomic::Ordering;
use std::sync::Arc;

use quillmask_search::status::{CostFn, GoalFn, HashFn};
use quillmask_search::{
    astar_search, astar_search_async, null_callback, Operator, SearchNode, SearchOptions,
    SearchStatus,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Num(u64);

#[derive(Clone)]
struct Ctx {
    goal: u64,
}

fn hash_fn() -> HashFn<Num> {
    Arc::new(|s: &Num| {
        let mut digest = [0u8; 16];
        digest[..8].copy_from_slice(&s.0.to_le_bytes());
        digest
    })
}

fn zero_h() -> CostFn<Num, Ctx> {
    Arc::new(|_: &SearchNode<Num>, _: &Ctx| 0.0)
}

fn goal_at_least() -> GoalFn<Num, Ctx> {
    Arc::new(|node: &SearchNode<Num>, ctx: &Ctx| node.state().0 >= ctx.goal)
}

struct Increment;

impl Operator<Num, Ctx> for Increment {
    fn name(&self) -> &str {
        "increment"
    }
    fn cost(&self) -> f64 {
        1.0
    }
    fn apply(&self, state: &Num, _ctx: &Ctx) -> Vec<Num> {
        vec![Num(state.0 + 1)]
    }
}

struct Double;

impl Operator<Num, Ctx> for Double {
    fn name(&self) -> &str {
        "double"
    }
    fn cost(&self) -> f64 {
        2.5
    }
    fn apply(&self, state: &Num, _ctx: &Ctx) -> Vec<Num> {
        vec![Num(state.0 * 2)]
    }
}

struct Panicking;

impl Operator<Num, Ctx> for Panicking {
    fn name(&self) -> &str {
        "panicking"
    }
    fn cost(&self) -> f64 {
        1.0
    }
    fn apply(&self, _state: &Num, _ctx: &Ctx) -> Vec<Num> {
        panic!("operator exploded");
    }
}

fn make_status(
    operators: Vec<Box<dyn Operator<Num, Ctx>>>,
    start: u64,
    goal: u64,
) -> Arc<SearchStatus<Num, Ctx>> {
    let mut status = SearchStatus::new(hash_fn(), zero_h(), goal_at_least());
    status.set_operators(operators);
    status.set_current(
        Arc::new(SearchNode::new_root(Num(start))),
        Ctx { goal },
    );
    Arc::new(status)
}


// Tests that exercise search behavior disable the memory guard so a
// loaded CI machine cannot abort them spuriously.
fn relaxed_options() -> SearchOptions {
    SearchOptions {
        free_memory_limit_in_mbytes: 0,
        ..Default::default()
    }
}

#[test]
fn finds_a_goal_state() {
    let status = make_status(vec![Box::new(Increment), Box::new(Double)], 1, 13);
    astar_search(&status, null_callback, &relaxed_options());

    assert!(status.finished.load(Ordering::SeqCst));
    assert!(status.has_goal_state.load(Ordering::SeqCst));
    assert!(status.error_message().is_none());

    let (node, _) = status.current().unwrap();
    assert!(node.state().0 >= 13);
    assert!(node.depth() > 0);
    assert!(status.num_goal_checks.load(Ordering::Relaxed) > 1);
    assert!(status.size_of_closed.load(Ordering::Relaxed) >= 1);
}

#[test]
fn with_zero_h_the_goal_is_reached_at_minimum_cost() {
    // With h = 0 this is uniform-cost search. The cheapest way to 16 is
    // incrementing to 4 and doubling twice:
    // 1 +1 +1 +1 (3.0) = 4, *2 (2.5) = 8, *2 (2.5) = 16, total 8.0.
    let status = make_status(vec![Box::new(Increment), Box::new(Double)], 1, 16);
    astar_search(&status, null_callback, &relaxed_options());

    let (node, _) = status.current().unwrap();
    assert_eq!(node.state().0, 16);
    assert!((node.cost_g() - 8.0).abs() < 1e-6);
}

#[test]
fn counts_duplicate_states() {
    // increment-increment and double reach 2 from 1 along different
    // paths, so duplicates must show up.
    let status = make_status(vec![Box::new(Increment), Box::new(Double)], 1, 50);
    astar_search(&status, null_callback, &relaxed_options());

    assert!(status.has_goal_state.load(Ordering::SeqCst));
    assert!(status.num_duplicated_states.load(Ordering::Relaxed) > 0);
}

#[test]
fn caller_abort_stops_the_search_within_one_iteration() {
    let status = make_status(vec![Box::new(Increment)], 0, u64::MAX);
    status.aborted_by_caller.store(true, Ordering::SeqCst);

    astar_search(&status, null_callback, &relaxed_options());

    assert!(status.finished.load(Ordering::SeqCst));
    assert!(!status.has_goal_state.load(Ordering::SeqCst));
    // Only the root was ever expanded.
    assert_eq!(status.num_goal_checks.load(Ordering::Relaxed), 1);
    assert_eq!(status.size_of_closed.load(Ordering::Relaxed), 1);
}

#[test]
fn memory_guard_aborts_cleanly() {
    let status = make_status(vec![Box::new(Increment)], 0, u64::MAX);

    let options = SearchOptions {
        free_memory_limit_in_mbytes: 1000,
        // Probe reports no free memory at all.
        memory_probe: Some(Arc::new(|| 0)),
        ..Default::default()
    };
    astar_search(&status, null_callback, &options);

    assert!(status.finished.load(Ordering::SeqCst));
    assert!(status.aborted_by_memguard.load(Ordering::SeqCst));
    assert!(!status.has_goal_state.load(Ordering::SeqCst));
    assert!(status.error_message().is_none());
}

#[test]
fn open_exhaustion_ends_without_goal_or_error() {
    // No operators: the root expands to nothing and OPEN drains.
    let status = make_status(vec![], 0, 100);
    astar_search(&status, null_callback, &relaxed_options());

    assert!(status.finished.load(Ordering::SeqCst));
    assert!(!status.has_goal_state.load(Ordering::SeqCst));
    assert!(status.error_message().is_none());
    assert_eq!(status.size_of_open.load(Ordering::Relaxed), 0);
}

#[test]
fn operator_panic_is_captured_as_an_error() {
    let status = make_status(vec![Box::new(Panicking)], 0, 100);

    // Panics cross the rayon boundary; the engine must convert them into
    // an error message and still signal completion.
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        astar_search(&status, null_callback, &relaxed_options());
    }));
    assert!(result.is_ok(), "the panic must not escape the engine");

    assert!(status.finished.load(Ordering::SeqCst));
    let message = status.error_message().expect("error must be recorded");
    assert!(message.contains("exploded"), "message = {message}");
}

#[test]
fn per_operator_stats_are_recorded() {
    let status = make_status(vec![Box::new(Increment), Box::new(Double)], 1, 6);
    astar_search(&status, null_callback, &relaxed_options());

    assert_eq!(status.operator_stats.len(), 2);
    for stats in &status.operator_stats {
        assert!(stats.num_applications.load(Ordering::Relaxed) > 0);
        assert!(stats.num_generated_states.load(Ordering::Relaxed) > 0);
    }
    assert_eq!(
        status.num_operator_applications(),
        status
            .operator_stats
            .iter()
            .map(|s| s.num_applications.load(Ordering::Relaxed))
            .sum::<u64>()
    );
}

#[test]
fn branching_factor_is_tracked() {
    let status = make_status(vec![Box::new(Increment), Box::new(Double)], 1, 10);
    astar_search(&status, null_callback, &relaxed_options());

    let max = status.branching_factor_max.load(Ordering::Relaxed);
    assert_eq!(max, 2);
}

#[test]
fn prune_keeps_the_search_alive() {
    // A tiny OPEN cap forces pruning on nearly every expansion; the
    // search must still reach the goal.
    let status = make_status(vec![Box::new(Increment), Box::new(Double)], 1, 40);
    let options = SearchOptions {
        max_open_size: 3,
        prune_keep_open: 2,
        free_memory_limit_in_mbytes: 0,
        ..Default::default()
    };
    astar_search(&status, null_callback, &options);

    assert!(status.has_goal_state.load(Ordering::SeqCst));
    assert!(status.error_message().is_none());
}

#[test]
fn async_entry_signals_completion() {
    let status = make_status(vec![Box::new(Increment), Box::new(Double)], 1, 20);

    astar_search_async(Arc::clone(&status), null_callback, relaxed_options());
    status.wait_for_completion();

    assert!(status.finished.load(Ordering::SeqCst));
    assert!(status.has_goal_state.load(Ordering::SeqCst));
}

#[test]
fn final_lists_are_available_after_the_run() {
    let status = make_status(vec![Box::new(Increment), Box::new(Double)], 1, 8);
    astar_search(&status, null_callback, &relaxed_options());

    let (open, closed) = status.take_lists().expect("lists are moved into status");
    assert_eq!(open.len() as u64, status.size_of_open.load(Ordering::Relaxed));
    assert_eq!(
        closed.len() as u64,
        status.size_of_closed.load(Ordering::Relaxed)
    );
    assert!(closed.len() >= 1);
}
