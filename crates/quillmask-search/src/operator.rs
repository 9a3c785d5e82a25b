use std::sync::atomic::AtomicU64;

/// A named, costed transformation that maps one state to a set of
/// successor states.
///
/// The returned vector may contain states that already exist elsewhere in
/// the search graph. Duplicate detection is handled by the engine, not by
/// operator implementations.
pub trait Operator<S, C>: Send + Sync {
    fn name(&self) -> &str;

    /// Edge weight added to a child's cost g.
    fn cost(&self) -> f64;

    fn description(&self) -> &str {
        ""
    }

    fn apply(&self, state: &S, context: &C) -> Vec<S>;
}

/// Usage statistics for one operator.
///
/// Instances are read and written from worker tasks while the search runs,
/// so all members are atomic.
#[derive(Debug, Default)]
pub struct OperatorStats {
    pub num_applications: AtomicU64,
    pub num_generated_states: AtomicU64,
    pub runtime_in_micros: AtomicU64,
}
