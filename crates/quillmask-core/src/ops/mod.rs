//! Local edit operators and the shared machinery that drives them.
//!
//! Every operator follows the same top-level recipe: pick the n-grams of
//! the current text whose reduction moves the distribution the right way,
//! locate their occurrences, and apply an operator-specific edit at each
//! of those focus points. The recipe lives here; operators implement only
//! [`EditOperator::apply_at_focus`].

pub mod flip;
pub mod punct;
pub mod remove;
pub mod suggest;
pub mod synonym;
pub mod words;

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use tracing::warn;

use quillmask_search::{Operator, StateDigest};

use crate::context::Context;
use crate::profile::{ngram_to_bytes, Ngram, NgramProfile, ORDER};
use crate::state::TextState;
use crate::text::{Edit, EDIT_LOG_THRESHOLD};

pub use flip::CharacterFlip;
pub use punct::PunctuationRemap;
pub use remove::NgramRemoval;
pub use suggest::{PhraseSuggester, Suggestion, WordRemoval, WordReplacement};
pub use synonym::ContextlessSubstitution;
pub use words::{load_dictionary, Dictionary};

/// Maximum number of ranked n-grams considered per state.
pub const MAX_NGRAM_RANK: usize = 10;

/// Maximum occurrences of one n-gram an operator is applied to.
pub const MAX_OCCURRENCES: usize = 2;

/// Maximum successors one operator returns per application.
pub const MAX_SUCCESSORS: usize = 6;

/// A position inside a materialized text at which an operator applies its
/// edit. `offset` points at the start of the ORDER-wide n-gram of
/// interest.
pub struct FocusPoint<'a> {
    pub text: &'a [u8],
    pub offset: usize,
}

/// Name, edge cost, and description shared by every operator.
pub struct OperatorInfo {
    pub name: String,
    pub cost: f64,
    pub description: String,
}

impl OperatorInfo {
    pub fn new(name: impl Into<String>, cost: f64, description: impl Into<String>) -> Self {
        if cost < 0.0 {
            warn!(cost, "operator has a negative cost");
        }
        Self {
            name: name.into(),
            cost,
            description: description.into(),
        }
    }
}

/// A local text transformation. Implementations provide the per-focus
/// edit; the generic [`Operator`] entry point (selection, bounding,
/// dedup) comes from the [`Ranked`] adapter.
pub trait EditOperator: Send + Sync {
    fn info(&self) -> &OperatorInfo;

    fn apply_at_focus(
        &self,
        focus: &FocusPoint<'_>,
        state: &TextState,
        context: &Context,
    ) -> Vec<TextState>;
}

/// Adapter giving an [`EditOperator`] the generic search-engine entry
/// point: cached n-gram selection, per-focus application, successor
/// bounding, and dedup.
pub struct Ranked<T>(pub T);

impl<T: EditOperator> Operator<TextState, Context> for Ranked<T> {
    fn name(&self) -> &str {
        &self.0.info().name
    }

    fn cost(&self) -> f64 {
        self.0.info().cost
    }

    fn description(&self) -> &str {
        &self.0.info().description
    }

    fn apply(&self, state: &TextState, context: &Context) -> Vec<TextState> {
        let Some(selection) = ngram_selection(state, context) else {
            return Vec::new();
        };

        let mut successors = Vec::new();
        for &offset in selection.positions.iter() {
            let focus = FocusPoint {
                text: &selection.text,
                offset,
            };
            successors.extend(self.0.apply_at_focus(&focus, state, context));
        }

        if successors.len() > MAX_SUCCESSORS {
            let mut rng = rng_for(context, state.hash_value(), self.name().len() as u64);
            rng.shuffle(&mut successors);
            successors.truncate(MAX_SUCCESSORS);
        }

        let mut seen: HashSet<StateDigest> = HashSet::with_capacity(successors.len());
        successors.retain(|s| seen.insert(s.hash_value()));
        successors
    }
}

/// Box an [`EditOperator`] as a search-engine operator.
pub fn boxed<T: EditOperator + 'static>(op: T) -> Box<dyn Operator<TextState, Context>> {
    Box::new(Ranked(op))
}

/// Focus points shared by all operators for one state: the materialized
/// text and the offsets of the selected n-gram occurrences.
#[derive(Clone)]
pub struct NgramSelection {
    pub text: Arc<Vec<u8>>,
    pub positions: Arc<Vec<usize>>,
}

type BoundsKey = (usize, usize, usize, usize);
type BoundsValue = (Vec<(usize, usize)>, Vec<(usize, usize)>);

/// Mutex-guarded working caches shared by all operators of one run. These
/// are carried through [`Context`] rather than process-wide statics so
/// every run (and every test) owns independent instances.
pub struct OperatorCaches {
    pub(crate) selection: Mutex<LruCache<StateDigest, NgramSelection>>,
    pub(crate) word_bounds: Mutex<LruCache<BoundsKey, BoundsValue>>,
    pub(crate) suggestions: Mutex<LruCache<String, Arc<Vec<Suggestion>>>>,
}

impl Default for OperatorCaches {
    fn default() -> Self {
        Self {
            selection: Mutex::new(LruCache::new(NonZeroUsize::new(200).expect("nonzero"))),
            word_bounds: Mutex::new(LruCache::new(NonZeroUsize::new(500).expect("nonzero"))),
            suggestions: Mutex::new(LruCache::new(NonZeroUsize::new(1000).expect("nonzero"))),
        }
    }
}

/// Derive an RNG for one operator invocation. Seeded runs mix the run
/// seed with the state digest and a per-call salt so every invocation
/// draws an independent, reproducible stream. Unseeded runs draw from
/// system entropy.
pub(crate) fn rng_for(context: &Context, digest: StateDigest, salt: u64) -> fastrand::Rng {
    match context.seed {
        Some(seed) => {
            let mut key = u64::from_le_bytes(digest[..8].try_into().expect("digest is 16 bytes"));
            key = key.wrapping_mul(0x100_0000_01b3).wrapping_add(salt);
            fastrand::Rng::with_seed(seed ^ key)
        }
        None => fastrand::Rng::new(),
    }
}

/// Rank the n-grams of `source` by how much their reduction helps.
///
/// Only n-grams occurring at least twice and present in the target count.
/// The rank is the ratio of target to source normalized frequency; ranks
/// below 1.0 are discarded because reducing those n-grams would pull the
/// distributions together instead of apart.
pub fn rank_ngrams(source: &NgramProfile, target: &NgramProfile) -> Vec<(Ngram, f32)> {
    let n = source.n() as f64;
    let mut ranked = Vec::with_capacity(source.size() / 2);

    for (ngram, count) in source.iter() {
        if count < 2 {
            continue;
        }

        let norm_q = count as f64 / n;
        let norm_p = target.norm_freq(ngram);
        if norm_p == 0.0 {
            continue;
        }

        let rank = norm_p / norm_q;
        if rank < 1.0 {
            continue;
        }

        ranked.push((ngram, rank as f32));
    }

    ranked
}

/// Compute (or fetch from the LRU) the focus points for a state: the top
/// [`MAX_NGRAM_RANK`] ranked n-grams, each located at up to
/// [`MAX_OCCURRENCES`] randomly chosen positions in the materialized text.
pub fn ngram_selection(state: &TextState, context: &Context) -> Option<NgramSelection> {
    let digest = state.hash_value();

    {
        let mut cache = context.caches.selection.lock().expect("selection cache poisoned");
        if let Some(cached) = cache.get(&digest) {
            return Some(cached.clone());
        }
    }

    let mut ranked = rank_ngrams(state.profile(), &context.target_profile);
    if ranked.is_empty() {
        return None;
    }
    ranked.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(MAX_NGRAM_RANK);

    let text = Arc::new(state.text().bytes());
    let mut rng = rng_for(context, digest, 0);

    let mut positions = Vec::new();
    for (ngram, _) in ranked {
        let pattern = ngram_to_bytes(ngram);
        let mut candidates: Vec<usize> = text
            .windows(ORDER)
            .enumerate()
            .filter(|&(_, w)| w == pattern.as_slice())
            .map(|(i, _)| i)
            .collect();

        rng.shuffle(&mut candidates);
        candidates.truncate(MAX_OCCURRENCES);
        positions.extend(candidates);
    }

    let selection = NgramSelection {
        text,
        positions: Arc::new(positions),
    };

    let mut cache = context.caches.selection.lock().expect("selection cache poisoned");
    cache.put(digest, selection.clone());
    Some(selection)
}

/// Build a successor state for one edit.
///
/// Replaces `text[edit_start..edit_end]` with `replacement`, refuses the
/// edit when the original n-gram at the focus reappears inside the ±ORDER
/// window around the edit site (the edit would undo itself), updates a
/// clone of the parent profile incrementally over the affected windows,
/// and extends the parent's diff log through the cheap rehash path.
pub fn update_successor(
    state: &TextState,
    focus: &FocusPoint<'_>,
    edit_start: usize,
    edit_end: usize,
    replacement: &[u8],
) -> Option<TextState> {
    let text = focus.text;
    debug_assert!(edit_start <= edit_end && edit_end <= text.len());

    let ngram_end = (focus.offset + ORDER).min(text.len());
    let original_ngram = &text[focus.offset..ngram_end];

    let mut new_text = Vec::with_capacity(text.len() - (edit_end - edit_start) + replacement.len());
    new_text.extend_from_slice(&text[..edit_start]);
    new_text.extend_from_slice(replacement);
    new_text.extend_from_slice(&text[edit_end..]);

    let new_begin = edit_start.saturating_sub(ORDER);
    let new_end = (edit_start + replacement.len() + ORDER).min(new_text.len());

    if !original_ngram.is_empty()
        && new_text[new_begin..new_end]
            .windows(original_ngram.len())
            .any(|w| w == original_ngram)
    {
        return None;
    }

    let old_begin = edit_start.saturating_sub(ORDER);
    let old_end = (edit_end + ORDER).min(text.len());
    if old_end - old_begin > u8::MAX as usize {
        return None;
    }

    let mut profile = (**state.profile()).clone();
    profile.update_from_windows(&text[old_begin..old_end], &new_text[new_begin..new_end]);

    let mut diff = state.text().clone();
    if diff.log_size() > EDIT_LOG_THRESHOLD {
        diff.apply();
    }
    diff.edit_with_text(
        Edit {
            pos: old_begin as u32,
            delete: (old_end - old_begin) as u8,
            insert: new_text[new_begin..new_end].to_vec(),
        },
        &new_text,
    );

    Some(TextState::from_parts(
        diff,
        Arc::new(profile),
        state.meta_snapshot(),
    ))
}
