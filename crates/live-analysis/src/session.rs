//! One game: the variation tree plus the things that react to it.
//!
//! Every mutating call runs change detection exactly once. A changed tree
//! shape goes to the tree sink; a changed displayed position restarts
//! analysis. Navigation changes the position but not the shape.

use std::sync::Arc;

use shakmaty::uci::UciMove;
use tracing::debug;

use chess_core::{pgn, rules, ChangeDetector, Opening, OpeningTrie, TreeView, VariationTree};

use crate::coordinator::AnalysisCoordinator;
use crate::engine::AnalysisEngine;
use crate::error::AnalysisError;
use crate::evaluation::Evaluation;
use crate::sink::TreeSink;

pub struct GameSession<E: AnalysisEngine> {
    tree: VariationTree,
    shape: ChangeDetector,
    position: ChangeDetector,
    openings: Arc<OpeningTrie>,
    tree_sink: Arc<dyn TreeSink>,
    analysis: Option<AnalysisCoordinator<E>>,
    /// Cursor of the node the running analysis belongs to
    analyzed: Vec<UciMove>,
    depth: u32,
    paused: bool,
}

impl<E: AnalysisEngine> GameSession<E> {
    /// A session without live evaluation. Attach an engine with
    /// `with_analysis`.
    pub fn new(openings: Arc<OpeningTrie>, tree_sink: Arc<dyn TreeSink>, depth: u32) -> Self {
        Self {
            tree: VariationTree::new(),
            shape: ChangeDetector::new(),
            position: ChangeDetector::new(),
            openings,
            tree_sink,
            analysis: None,
            analyzed: Vec::new(),
            depth,
            paused: false,
        }
    }

    pub fn with_analysis(mut self, coordinator: AnalysisCoordinator<E>) -> Self {
        self.analysis = Some(coordinator);
        self
    }

    /// Publish the initial tree and start analyzing the start position.
    pub async fn open(&mut self) -> Result<(), AnalysisError> {
        self.after_mutation().await
    }

    pub async fn play(&mut self, uci: &str) -> Result<UciMove, AnalysisError> {
        let mv = rules::parse_uci(uci)?;
        let played = self.tree.play(&mv)?;
        self.after_mutation().await?;
        Ok(played)
    }

    pub async fn navigate_forward(&mut self) -> Result<Option<UciMove>, AnalysisError> {
        let mv = self.tree.navigate_forward()?;
        self.after_mutation().await?;
        Ok(mv)
    }

    pub async fn navigate_backward(&mut self) -> Result<Option<UciMove>, AnalysisError> {
        let mv = self.tree.navigate_backward();
        self.after_mutation().await?;
        Ok(mv)
    }

    pub async fn reset(&mut self) -> Result<(), AnalysisError> {
        self.tree.reset();
        self.after_mutation().await
    }

    /// Make the displayed node the mainline at its branch point.
    pub async fn promote(&mut self) -> Result<bool, AnalysisError> {
        let changed = self.tree.promote_to_mainline()?;
        self.after_mutation().await?;
        Ok(changed)
    }

    /// Replace the tree with a game read from PGN; the cursor ends on its
    /// last move.
    pub async fn load_pgn(&mut self, text: &str) -> Result<(), AnalysisError> {
        self.tree = pgn::load_pgn(text)?;
        self.after_mutation().await
    }

    /// Comments are not part of the tree shape, so no notification is sent.
    pub fn annotate(&mut self, comment: Option<String>) -> Result<(), AnalysisError> {
        self.tree.annotate(comment)?;
        Ok(())
    }

    pub fn tree(&self) -> &VariationTree {
        &self.tree
    }

    pub fn tree_view(&self) -> TreeView {
        self.tree.serialize()
    }

    pub fn fen(&self) -> Result<String, AnalysisError> {
        Ok(self.tree.current_fen()?)
    }

    pub fn cursor(&self) -> Vec<String> {
        self.tree.cursor().iter().map(|m| m.to_string()).collect()
    }

    /// Openings matching the longest known prefix of the mainline.
    pub fn opening(&self) -> Result<Option<Vec<Opening>>, AnalysisError> {
        let tokens = self.tree.opening_tokens()?;
        Ok(self.openings.find_opening(&tokens).map(<[Opening]>::to_vec))
    }

    pub fn pgn(&self) -> Result<String, AnalysisError> {
        Ok(self.tree.to_pgn()?)
    }

    pub fn last_evaluation(&self) -> Option<Evaluation> {
        self.analysis.as_ref().and_then(|a| a.last_evaluation())
    }

    pub fn is_analyzing(&self) -> bool {
        self.analysis.as_ref().is_some_and(|a| a.is_running())
    }

    /// Stop analysis until `resume_analysis`.
    pub async fn pause_analysis(&mut self) {
        self.paused = true;
        self.stop_analysis().await;
    }

    pub async fn resume_analysis(&mut self) -> Result<(), AnalysisError> {
        self.paused = false;
        self.restart_analysis().await
    }

    /// Stop analysis and shut the engine down.
    pub async fn close(&mut self) {
        self.stop_analysis().await;
        if let Some(analysis) = &mut self.analysis {
            analysis.shutdown().await;
        }
    }

    async fn after_mutation(&mut self) -> Result<(), AnalysisError> {
        if self.shape.has_changed(&self.tree).is_some() {
            self.tree_sink.on_tree_changed(&self.tree.serialize());
        }

        let fen = self.tree.current_fen()?;
        if self.position.observe(fen).is_some() {
            self.restart_analysis().await?;
        }
        Ok(())
    }

    async fn stop_analysis(&mut self) {
        if let Some(analysis) = &mut self.analysis {
            analysis.stop().await;
        }
        self.store_evaluation();
    }

    async fn restart_analysis(&mut self) -> Result<(), AnalysisError> {
        self.stop_analysis().await;
        if self.paused {
            return Ok(());
        }
        let Some(analysis) = &mut self.analysis else {
            return Ok(());
        };

        let position = self.tree.current_position()?;
        analysis.start(&position, self.depth)?;
        self.analyzed = self.tree.cursor().to_vec();
        Ok(())
    }

    /// Keep the last evaluation of the finished session on its node.
    fn store_evaluation(&mut self) {
        let Some(evaluation) = self.last_evaluation() else {
            return;
        };

        // After a reset or a PGN load the path may be gone, or lead elsewhere.
        let mut position = self.tree.start_position().clone();
        for mv in &self.analyzed {
            match rules::apply(&position, mv) {
                Ok((next, _)) => position = next,
                Err(_) => return,
            }
        }
        if rules::to_fen(&position) != evaluation.fen {
            return;
        }

        if let Err(e) = self.tree.set_evaluation_at(&self.analyzed, evaluation.node_eval()) {
            debug!(error = %e, "Analyzed node no longer in tree");
        }
    }
}
