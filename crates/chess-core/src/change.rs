//! Change detection over fingerprints.
//!
//! Two different questions are answered with this type: "did the tree shape
//! change" (refresh the tree view) and "did the displayed position change"
//! (restart analysis). Each gets its own detector.

use crate::variation::VariationTree;

#[derive(Debug, Default)]
pub struct ChangeDetector {
    last: Option<String>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `fingerprint`. Returns it if it differs from the previous one.
    pub fn observe(&mut self, fingerprint: String) -> Option<String> {
        if self.last.as_deref() == Some(fingerprint.as_str()) {
            return None;
        }
        self.last = Some(fingerprint.clone());
        Some(fingerprint)
    }

    /// Observe the tree-shape fingerprint of `tree`.
    pub fn has_changed(&mut self, tree: &VariationTree) -> Option<String> {
        self.observe(tree.fingerprint())
    }

    pub fn last(&self) -> Option<&str> {
        self.last.as_deref()
    }
}
