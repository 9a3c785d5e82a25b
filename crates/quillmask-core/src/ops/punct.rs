use crate::context::Context;
use crate::ops::{rng_for, update_successor, EditOperator, FocusPoint, OperatorInfo};
use crate::profile::ORDER;
use crate::state::TextState;

/// Interchangeable punctuation. Each mark maps to marks a writer could
/// plausibly have used instead.
pub fn remap_variants(b: u8) -> Option<&'static [u8]> {
    match b {
        b',' => Some(&[b';', b'.']),
        b'.' => Some(&[b',', b'!']),
        b':' => Some(&[b'.', b';']),
        b'!' => Some(&[b'.', b',']),
        b'?' => Some(&[b'.']),
        _ => None,
    }
}

/// Replaces punctuation inside the n-gram at the focus with a randomly
/// chosen alternative, yielding up to ORDER successors. This is the cheap
/// workhorse operator: splitting or joining sentences barely disturbs the
/// meaning.
pub struct PunctuationRemap {
    info: OperatorInfo,
}

impl PunctuationRemap {
    pub fn new(name: impl Into<String>, cost: f64, description: impl Into<String>) -> Self {
        Self {
            info: OperatorInfo::new(name, cost, description),
        }
    }
}

impl EditOperator for PunctuationRemap {
    fn info(&self) -> &OperatorInfo {
        &self.info
    }

    fn apply_at_focus(
        &self,
        focus: &FocusPoint<'_>,
        state: &TextState,
        context: &Context,
    ) -> Vec<TextState> {
        let text = focus.text;
        let mut rng = rng_for(context, state.hash_value(), focus.offset as u64 + 1);
        let mut successors = Vec::new();

        for i in 0..ORDER {
            let pos = focus.offset + i;
            if pos >= text.len() {
                break;
            }

            let Some(variants) = remap_variants(text[pos]) else {
                continue;
            };
            let replacement = [variants[rng.usize(0..variants.len())]];

            if let Some(successor) = update_successor(state, focus, pos, pos + 1, &replacement) {
                successors.push(successor);
            }
        }

        successors
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(b',', &[b';', b'.'])]
    #[case(b'.', &[b',', b'!'])]
    #[case(b':', &[b'.', b';'])]
    #[case(b'!', &[b'.', b','])]
    #[case(b'?', &[b'.'])]
    fn mapped_marks(#[case] mark: u8, #[case] expected: &[u8]) {
        assert_eq!(remap_variants(mark), Some(expected));
    }

    #[rstest]
    #[case(b'a')]
    #[case(b' ')]
    #[case(b';')]
    fn unmapped_bytes(#[case] b: u8) {
        assert_eq!(remap_variants(b), None);
    }
}
