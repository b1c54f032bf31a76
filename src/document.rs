//! The live buffer: one owned string plus the patch count that produced it.

use crate::patch::{self, PatchStats};

/// Document text equal to every patch applied so far, in arrival order, on top
/// of an empty buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveDocument {
    text: String,
    patches: u64,
}

impl LiveDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, patch: &str) -> PatchStats {
        self.patches += 1;
        patch::apply(&mut self.text, patch)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of patches applied, including ones that changed nothing.
    pub fn patch_count(&self) -> u64 {
        self.patches
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// A patch that rebuilds this document from empty. See [`patch::snapshot`].
    pub fn snapshot_patch(&self) -> String {
        patch::snapshot(&self.text)
    }
}
