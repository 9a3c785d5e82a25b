use crate::context::Context;
use crate::ops::{update_successor, EditOperator, FocusPoint, OperatorInfo};
use crate::profile::ORDER;
use crate::state::TextState;

/// Swaps each pair of neighboring bytes inside the n-gram at the focus,
/// yielding up to ORDER - 1 successors. Swaps that leave the text
/// unchanged are skipped.
pub struct CharacterFlip {
    info: OperatorInfo,
}

impl CharacterFlip {
    pub fn new(name: impl Into<String>, cost: f64, description: impl Into<String>) -> Self {
        Self {
            info: OperatorInfo::new(name, cost, description),
        }
    }
}

impl EditOperator for CharacterFlip {
    fn info(&self) -> &OperatorInfo {
        &self.info
    }

    fn apply_at_focus(
        &self,
        focus: &FocusPoint<'_>,
        state: &TextState,
        _context: &Context,
    ) -> Vec<TextState> {
        let text = focus.text;
        let mut successors = Vec::new();

        for i in 0..ORDER - 1 {
            let start = focus.offset + i;
            if start + 2 >= text.len() {
                break;
            }

            if text[start] == text[start + 1] {
                continue;
            }
            let flipped = [text[start + 1], text[start]];

            if let Some(successor) = update_successor(state, focus, start, start + 2, &flipped) {
                successors.push(successor);
            }
        }

        successors
    }
}
