use itertools::{EitherOrBoth, Itertools};
use tracing::warn;

use quillmask_search::SearchNode;

use crate::context::Context;
use crate::profile::NgramProfile;
use crate::state::TextState;

/// Dekker (1971) compensated summation: the accumulated error of each
/// addition is carried in a low-order term instead of being discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DekkerSum {
    hi: f64,
    lo: f64,
}

impl DekkerSum {
    pub fn add(&mut self, x: f64) {
        let r = self.hi + x;
        let s = if self.hi.abs() > x.abs() {
            self.hi - r + x + self.lo
        } else {
            x - r + self.hi + self.lo
        };
        self.hi = r + s;
        self.lo = r - self.hi + s;
    }

    pub fn value(&self) -> f64 {
        self.hi
    }
}

/// Past this gap the smaller addend no longer affects the sum at f64
/// precision.
const LOG_ADD_THRESHOLD: f64 = std::f64::consts::LN_2 * 64.0 + 1.0;

/// Add two probabilities in natural log space.
pub fn log_add(mut x: f64, mut y: f64) -> f64 {
    if y > x {
        std::mem::swap(&mut x, &mut y);
    }
    if x - y > LOG_ADD_THRESHOLD {
        return x;
    }
    x + (y - x).exp().ln_1p()
}

/// JS-distance, a metric in [0, sqrt(2)].
pub fn js_distance(jsd: f64) -> f64 {
    (2.0 * jsd).sqrt()
}

/// Exact Jensen-Shannon divergence between two n-gram profiles, each
/// normalized by its own total count.
///
/// Works in natural log space over a simultaneous walk of both key-sorted
/// iterations. A positive sentinel stands for "no mass on this side" and
/// inhibits that side's contribution. Both partial sums are accumulated
/// with compensated summation; the result lies in [0, 1] up to numerical
/// noise.
pub fn calculate_jsd(source: &NgramProfile, target: &NgramProfile) -> f64 {
    let p_norm = (target.n() as f64).ln();
    let q_norm = (source.n() as f64).ln();
    let log_half = 0.5f64.ln();

    let mut jsd_p = DekkerSum::default();
    let mut jsd_q = DekkerSum::default();

    for merged in target
        .iter()
        .merge_join_by(source.iter(), |a, b| a.0.cmp(&b.0))
    {
        let (p, q) = match merged {
            EitherOrBoth::Left((_, p_count)) => ((p_count as f64).ln() - p_norm, 1.0),
            EitherOrBoth::Right((_, q_count)) => (1.0, (q_count as f64).ln() - q_norm),
            EitherOrBoth::Both((_, p_count), (_, q_count)) => (
                (p_count as f64).ln() - p_norm,
                (q_count as f64).ln() - q_norm,
            ),
        };

        let m = if p <= 0.0 && q <= 0.0 {
            log_half + log_add(p, q)
        } else {
            log_half + p.min(q)
        };

        if p <= 0.0 {
            jsd_p.add(p.exp() * ((p - m) * std::f64::consts::LOG2_E));
        }
        if q <= 0.0 {
            jsd_q.add(q.exp() * ((q - m) * std::f64::consts::LOG2_E));
        }
    }

    0.5 * (jsd_p.value() + jsd_q.value())
}

/// The h-function: estimated remaining cost to reach the goal distance.
///
/// The first call of a run records the divergence of the unedited text.
/// From then on each node's cost-per-unit-progress `g / (dist - dist_0)`
/// is extrapolated over the remaining distance `goal - dist`. This shape
/// is not formally admissible; the engine compensates by reopening closed
/// states when a cheaper path appears.
pub fn compute_cost_h(node: &SearchNode<TextState>, context: &Context) -> f64 {
    let state = node.state();

    let mut jsd = calculate_jsd(state.profile(), &context.target_profile);
    if jsd > 1.0 {
        warn!(jsd, "numerical underflow: divergence above 1, clamping");
        jsd = 1.0;
    }
    state.set_cached_jsd(jsd);

    let (original_jsd, goal) = {
        let mut meta = context.meta_lock();
        let original = *meta
            .original_jsd
            .get_or_insert_with(|| (jsd - 1.0e-10).max(0.0));
        (original, meta.goal_js_dist.unwrap_or(0.0))
    };

    let dist = js_distance(jsd);
    let cost_per_progress = node.cost_g() as f64 / (dist - js_distance(original_jsd)).max(1.0e-6);
    let remaining = (goal - dist).max(0.0);
    remaining * cost_per_progress
}

/// Goal predicate: the node is past the root and its cached distance has
/// reached the goal.
pub fn is_goal_state(node: &SearchNode<TextState>, context: &Context) -> bool {
    let Some(jsd) = node.state().cached_jsd() else {
        return false;
    };
    let Some(goal) = context.meta_lock().goal_js_dist else {
        return false;
    };
    node.depth() > 0 && js_distance(jsd) >= goal
}
