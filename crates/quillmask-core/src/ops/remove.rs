use crate::context::Context;
use crate::ops::{update_successor, EditOperator, FocusPoint, OperatorInfo};
use crate::profile::ORDER;
use crate::state::TextState;

/// Deletes the ORDER-wide n-gram at the focus point outright.
pub struct NgramRemoval {
    info: OperatorInfo,
}

impl NgramRemoval {
    pub fn new(name: impl Into<String>, cost: f64, description: impl Into<String>) -> Self {
        Self {
            info: OperatorInfo::new(name, cost, description),
        }
    }
}

impl EditOperator for NgramRemoval {
    fn info(&self) -> &OperatorInfo {
        &self.info
    }

    fn apply_at_focus(
        &self,
        focus: &FocusPoint<'_>,
        state: &TextState,
        _context: &Context,
    ) -> Vec<TextState> {
        let end = (focus.offset + ORDER).min(focus.text.len());
        update_successor(state, focus, focus.offset, end, b"")
            .into_iter()
            .collect()
    }
}
