use std::sync::Arc;

use crate::context::Context;
use crate::ops::words::{parse_word_bounds, Dictionary};
use crate::ops::{update_successor, EditOperator, FocusPoint, OperatorInfo};
use crate::state::TextState;

/// Replaces the word under the focus with alternatives from a dictionary,
/// without looking at the surrounding context. One successor per
/// alternative. Both the synonym and the hypernym operator are instances
/// of this type with different dictionaries.
pub struct ContextlessSubstitution {
    info: OperatorInfo,
    dictionary: Arc<Dictionary>,
}

impl ContextlessSubstitution {
    pub fn new(
        name: impl Into<String>,
        cost: f64,
        description: impl Into<String>,
        dictionary: Arc<Dictionary>,
    ) -> Self {
        Self {
            info: OperatorInfo::new(name, cost, description),
            dictionary,
        }
    }
}

impl EditOperator for ContextlessSubstitution {
    fn info(&self) -> &OperatorInfo {
        &self.info
    }

    fn apply_at_focus(
        &self,
        focus: &FocusPoint<'_>,
        state: &TextState,
        context: &Context,
    ) -> Vec<TextState> {
        let (_, current) = parse_word_bounds(focus, 0, 0, context);
        let (word_start, word_end) = current[0];
        if word_end <= word_start {
            return Vec::new();
        }

        let word = String::from_utf8_lossy(&focus.text[word_start..word_end]).to_lowercase();
        let Some(alternatives) = self.dictionary.get(&word) else {
            return Vec::new();
        };

        let mut successors = Vec::new();
        for alternative in alternatives {
            if let Some(successor) =
                update_successor(state, focus, word_start, word_end, alternative.as_bytes())
            {
                successors.push(successor);
            }
        }
        successors
    }
}
