//! Word substitution and removal backed by an external phrase suggester.
//!
//! The suggester answers "which words commonly appear in this slot" for a
//! wildcard query built from the words around the focus. No backend ships
//! with the crate; callers supply an implementation of
//! [`PhraseSuggester`] (a web n-gram index, a local language model, or a
//! test stub).

use std::sync::Arc;

use crate::context::Context;
use crate::ops::words::parse_word_bounds;
use crate::ops::{update_successor, EditOperator, FocusPoint, OperatorInfo};
use crate::state::TextState;

/// One phrase completion: its words and its corpus frequency.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub words: Vec<String>,
    pub frequency: u64,
}

/// External source of phrase completions for wildcard queries.
pub trait PhraseSuggester: Send + Sync {
    fn suggest(&self, query: &str, max_phrases: usize) -> Vec<Suggestion>;
}

/// Phrases below this corpus frequency are ignored.
pub const MIN_PHRASE_FREQUENCY: u64 = 50_000;

/// Maximum completions requested per query.
pub const MAX_PHRASE_SUGGESTIONS: usize = 5;

/// Fetch suggestions through the context LRU.
fn cached_suggestions(
    suggester: &dyn PhraseSuggester,
    context: &Context,
    query: &str,
) -> Arc<Vec<Suggestion>> {
    {
        let mut cache = context
            .caches
            .suggestions
            .lock()
            .expect("suggestion cache poisoned");
        if let Some(cached) = cache.get(query) {
            return Arc::clone(cached);
        }
    }

    let response = Arc::new(suggester.suggest(query, MAX_PHRASE_SUGGESTIONS));

    let mut cache = context
        .caches
        .suggestions
        .lock()
        .expect("suggestion cache poisoned");
    cache.put(query.to_string(), Arc::clone(&response));
    response
}

/// The three context windows tried around the focus word: `2 + offset`
/// words before, `2 - offset` after.
const WINDOW_OFFSETS: [i32; 3] = [-1, 0, 1];

fn push_words(query: &mut String, text: &[u8], bounds: &[(usize, usize)]) {
    for &(start, end) in bounds {
        query.push_str(&String::from_utf8_lossy(&text[start..end]));
        query.push(' ');
    }
}

/// Replaces the focus word with words the suggester reports as common in
/// the same slot.
pub struct WordReplacement {
    info: OperatorInfo,
    suggester: Arc<dyn PhraseSuggester>,
}

impl WordReplacement {
    pub fn new(
        name: impl Into<String>,
        cost: f64,
        description: impl Into<String>,
        suggester: Arc<dyn PhraseSuggester>,
    ) -> Self {
        Self {
            info: OperatorInfo::new(name, cost, description),
            suggester,
        }
    }
}

impl EditOperator for WordReplacement {
    fn info(&self) -> &OperatorInfo {
        &self.info
    }

    fn apply_at_focus(
        &self,
        focus: &FocusPoint<'_>,
        state: &TextState,
        context: &Context,
    ) -> Vec<TextState> {
        let mut successors = Vec::new();

        for offset in WINDOW_OFFSETS {
            let before_count = (2 + offset) as usize;
            let after_count = (2 - offset) as usize;
            let (before, after) = parse_word_bounds(focus, before_count, after_count, context);
            if before.is_empty() || after.len() < 2 {
                continue;
            }

            let mut query = String::new();
            push_words(&mut query, focus.text, &before);
            query.push_str("? ");
            push_words(&mut query, focus.text, &after[1..]);

            let response = cached_suggestions(self.suggester.as_ref(), context, &query);
            let (word_start, word_end) = after[0];

            for phrase in response.iter() {
                if phrase.frequency < MIN_PHRASE_FREQUENCY {
                    continue;
                }
                let Some(replacement) = phrase.words.get(before.len()) else {
                    continue;
                };
                if let Some(successor) =
                    update_successor(state, focus, word_start, word_end, replacement.as_bytes())
                {
                    successors.push(successor);
                }
            }
        }

        successors
    }
}

/// Deletes the focus word when the surrounding phrase is common without
/// it.
pub struct WordRemoval {
    info: OperatorInfo,
    suggester: Arc<dyn PhraseSuggester>,
}

impl WordRemoval {
    pub fn new(
        name: impl Into<String>,
        cost: f64,
        description: impl Into<String>,
        suggester: Arc<dyn PhraseSuggester>,
    ) -> Self {
        Self {
            info: OperatorInfo::new(name, cost, description),
            suggester,
        }
    }
}

impl EditOperator for WordRemoval {
    fn info(&self) -> &OperatorInfo {
        &self.info
    }

    fn apply_at_focus(
        &self,
        focus: &FocusPoint<'_>,
        state: &TextState,
        context: &Context,
    ) -> Vec<TextState> {
        let mut successors = Vec::new();

        for offset in WINDOW_OFFSETS {
            let before_count = (2 + offset) as usize;
            let after_count = (2 - offset) as usize;
            let (before, after) = parse_word_bounds(focus, before_count, after_count, context);
            if before.is_empty() || after.len() < 2 {
                continue;
            }

            // The query omits the focus word entirely.
            let mut query = String::new();
            push_words(&mut query, focus.text, &before);
            push_words(&mut query, focus.text, &after[1..]);

            let response = cached_suggestions(self.suggester.as_ref(), context, &query);
            let (word_start, word_end) = after[0];

            for phrase in response.iter() {
                if phrase.frequency < MIN_PHRASE_FREQUENCY {
                    continue;
                }
                if let Some(successor) = update_successor(state, focus, word_start, word_end, b"") {
                    successors.push(successor);
                }
            }
        }

        successors
    }
}
