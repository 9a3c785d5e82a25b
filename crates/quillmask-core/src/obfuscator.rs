use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use quillmask_search::{astar_search, memory, SearchNode, SearchOptions, SearchStatus};

use crate::context::Context;
use crate::cost::{compute_cost_h, is_goal_state, js_distance};
use crate::error::QmResult;
use crate::normalize::{normalize_text, strip_pos_annotations};
use crate::ops::{
    self, load_dictionary, CharacterFlip, ContextlessSubstitution, NgramRemoval, PhraseSuggester,
    PunctuationRemap, WordRemoval, WordReplacement,
};
use crate::output::ReplaceSink;
use crate::profile::NgramProfile;
use crate::state::TextState;

/// Goal JS-distance as a function of input length, fitted on a training
/// corpus: texts short enough to verify loosely need a larger distance
/// than long ones.
pub fn goal_js_distance(text_len: usize) -> f64 {
    -0.10437 * (text_len as f64).log2() + 2.0831
}

pub type Status = SearchStatus<TextState, Context>;

/// Knobs for one obfuscation run.
pub struct ObfuscationOptions {
    /// Strip `/TAG` part-of-speech annotations from the input.
    pub strip_pos: bool,

    /// Skip Unicode/punctuation canonicalization of the input.
    pub skip_normalization: bool,

    /// Seed for all operator randomness. `None` leaves runs
    /// non-deterministic.
    pub seed: Option<u64>,

    /// Override for the goal JS-distance. `None` applies the built-in
    /// length-based formula.
    pub goal_js_dist: Option<f64>,

    pub status_update_interval: u64,
    pub free_memory_limit_in_mbytes: u64,
    pub max_open_size: usize,
    pub prune_keep_open: usize,

    pub synonym_dictionary: Option<PathBuf>,
    pub hypernym_dictionary: Option<PathBuf>,
    pub suggester: Option<Arc<dyn PhraseSuggester>>,
}

impl Default for ObfuscationOptions {
    fn default() -> Self {
        Self {
            strip_pos: false,
            skip_normalization: false,
            seed: None,
            goal_js_dist: None,
            status_update_interval: 500,
            free_memory_limit_in_mbytes: 2000,
            max_open_size: 40_000,
            prune_keep_open: 10,
            synonym_dictionary: None,
            hypernym_dictionary: None,
            suggester: None,
        }
    }
}

pub struct Obfuscator {
    options: ObfuscationOptions,
}

impl Obfuscator {
    pub fn new(options: ObfuscationOptions) -> Self {
        Self { options }
    }

    /// Rewrite `input` until its n-gram distribution is far enough from
    /// `target`, writing the best candidate so far through `sink` as the
    /// search progresses. Returns the status handle for inspection.
    pub fn obfuscate(
        &self,
        input: &[u8],
        sink: &mut dyn ReplaceSink,
        target: Arc<NgramProfile>,
    ) -> QmResult<Arc<Status>> {
        let mut text = String::from_utf8_lossy(input).into_owned();
        if self.options.strip_pos {
            text = strip_pos_annotations(&text);
        }
        if !self.options.skip_normalization {
            text = normalize_text(&text);
        }
        let bytes = text.into_bytes();

        let context = Context::new(target).with_seed(self.options.seed);
        {
            let mut meta = context.meta_lock();
            meta.original_text_length = Some(bytes.len());
            let goal = self
                .options
                .goal_js_dist
                .unwrap_or_else(|| goal_js_distance(bytes.len()));
            meta.goal_js_dist = Some(goal);
            info!(
                text_len = bytes.len(),
                goal_js_dist = goal,
                "starting obfuscation run"
            );
        }

        let initial = TextState::from_text_bytes(bytes)?;

        let mut status = SearchStatus::new(
            Arc::new(|s: &TextState| s.hash_value()),
            Arc::new(compute_cost_h),
            Arc::new(is_goal_state),
        );
        status
            .init_memory_in_kbytes
            .store(memory::used_memory_in_kbytes(), Ordering::Relaxed);
        status.set_operators(self.build_operators());
        status.set_current(
            Arc::new(SearchNode::new_root(initial)),
            context.clone(),
        );
        let status = Arc::new(status);

        let search_options = SearchOptions {
            status_update_interval: self.options.status_update_interval,
            free_memory_limit_in_mbytes: self.options.free_memory_limit_in_mbytes,
            max_open_size: self.options.max_open_size,
            prune_keep_open: self.options.prune_keep_open,
            memory_probe: None,
        };

        let sink = Mutex::new(sink);
        let best_jsd = Mutex::new(0.0f64);

        let callback = |s: &Status| {
            let Some((node, context)) = s.current() else {
                return;
            };
            let state = node.state();
            let jsd = state.cached_jsd().unwrap_or(0.0);

            let mut best = best_jsd.lock().expect("best candidate lock poisoned");
            if s.has_goal_state.load(Ordering::SeqCst) || jsd > *best {
                let text = state.text().bytes();
                if let Err(e) = sink
                    .lock()
                    .expect("sink lock poisoned")
                    .replace(&text)
                {
                    warn!("could not write candidate: {e}");
                }
                *best = jsd;
            }
            drop(best);

            let goal = context.meta_lock().goal_js_dist.unwrap_or(0.0);
            debug!(
                depth = node.depth(),
                open = s.size_of_open.load(Ordering::Relaxed),
                closed = s.size_of_closed.load(Ordering::Relaxed),
                reopened = s.num_reopened_states.load(Ordering::Relaxed),
                duplicated = s.num_duplicated_states.load(Ordering::Relaxed),
                used_mib = s.used_memory_in_kbytes.load(Ordering::Relaxed) / 1024,
                runtime_ms = s.runtime_in_millis.load(Ordering::Relaxed),
                js_dist = js_distance(jsd),
                goal_js_dist = goal,
                "expansion"
            );
        };

        astar_search(&status, callback, &search_options);

        // Final snapshot: make sure the goal text (or the best effort)
        // lands in the sink.
        if let Some((node, _)) = status.current() {
            let state = node.state();
            let jsd = state.cached_jsd().unwrap_or(0.0);
            let reached = status.has_goal_state.load(Ordering::SeqCst);
            if reached || jsd >= *best_jsd.lock().expect("best candidate lock poisoned") {
                let text = state.text().bytes();
                if let Err(e) = sink.lock().expect("sink lock poisoned").replace(&text) {
                    warn!("could not write final text: {e}");
                }
            }
            info!(
                goal_reached = reached,
                depth = node.depth(),
                js_dist = js_distance(jsd),
                runtime_ms = status.runtime_in_millis.load(Ordering::Relaxed),
                "obfuscation run finished"
            );
        }
        if let Some(message) = status.error_message() {
            warn!("search reported an error: {message}");
        }

        Ok(status)
    }

    /// The operator lineup. Dictionary-backed operators are dropped with
    /// a warning when their dictionary cannot be read; suggester-backed
    /// operators exist only when a suggester is configured.
    fn build_operators(&self) -> Vec<Box<dyn quillmask_search::Operator<TextState, Context>>> {
        let mut operators = vec![
            ops::boxed(NgramRemoval::new(
                "n-gram removal",
                40.0,
                "delete an n-gram from the text",
            )),
            ops::boxed(CharacterFlip::new(
                "character flips",
                30.0,
                "swap two neighboring characters",
            )),
            ops::boxed(PunctuationRemap::new(
                "punctuation remap",
                3.0,
                "replace punctuation marks with interchangeable ones",
            )),
        ];

        if let Some(path) = &self.options.synonym_dictionary {
            match load_dictionary(path) {
                Ok(dict) => operators.push(ops::boxed(ContextlessSubstitution::new(
                    "context-less synonyms",
                    10.0,
                    "replace words with synonyms, ignoring context",
                    dict,
                ))),
                Err(e) => warn!("synonym operator disabled: {e}"),
            }
        }

        if let Some(path) = &self.options.hypernym_dictionary {
            match load_dictionary(path) {
                Ok(dict) => operators.push(ops::boxed(ContextlessSubstitution::new(
                    "context-less hypernyms",
                    6.0,
                    "replace words with broader terms, ignoring context",
                    dict,
                ))),
                Err(e) => warn!("hypernym operator disabled: {e}"),
            }
        }

        if let Some(suggester) = &self.options.suggester {
            operators.push(ops::boxed(WordReplacement::new(
                "word replacement",
                4.0,
                "replace a word when the replacement commonly appears in that context",
                Arc::clone(suggester),
            )));
            operators.push(ops::boxed(WordRemoval::new(
                "word removal",
                2.0,
                "delete a word that is not strictly needed in its context",
                Arc::clone(suggester),
            )));
        }

        operators
    }
}
