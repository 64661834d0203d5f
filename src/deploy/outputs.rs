//! Stack output extraction.

use std::collections::BTreeMap;

use crate::cloudformation::Stack;

/// Converts a stack's outputs into a key/value map.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputExtractor;

impl OutputExtractor {
    /// Creates a new extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns the stack's outputs keyed by output name.
    ///
    /// Returns `None` when the stack declares no outputs.
    #[must_use]
    pub fn extract(&self, stack: &Stack) -> Option<BTreeMap<String, String>> {
        if stack.outputs.is_empty() {
            return None;
        }

        Some(
            stack
                .outputs
                .iter()
                .map(|o| (o.key.clone(), o.value.clone()))
                .collect(),
        )
    }
}
