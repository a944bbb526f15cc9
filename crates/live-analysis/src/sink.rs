//! Callbacks into the transport layer.
//!
//! The core publishes to exactly one sink of each kind; fanning out to
//! several subscribers is the transport's job.

use chess_core::TreeView;

use crate::evaluation::Evaluation;

pub trait TreeSink: Send + Sync {
    fn on_tree_changed(&self, tree: &TreeView);
}

/// Called from the background analysis task, once per streamed record.
pub trait EvaluationSink: Send + Sync + 'static {
    fn on_evaluation(&self, evaluation: &Evaluation);
}

impl<F> TreeSink for F
where
    F: Fn(&TreeView) + Send + Sync,
{
    fn on_tree_changed(&self, tree: &TreeView) {
        self(tree)
    }
}

impl<F> EvaluationSink for F
where
    F: Fn(&Evaluation) + Send + Sync + 'static,
{
    fn on_evaluation(&self, evaluation: &Evaluation) {
        self(evaluation)
    }
}
