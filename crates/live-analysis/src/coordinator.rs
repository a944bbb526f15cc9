//! Background analysis of the displayed position.
//!
//! At most one session runs at a time. A session is a spawned task that
//! holds the engine lock for its whole life, streams records to the
//! evaluation sink, and ends when the target depth is reached, the engine
//! finishes, a fault occurs, or it is cancelled. `stop` signals cancellation
//! and joins the task, so no record from an old session can reach the sink
//! once `stop` (or `restart`) has returned.

use std::sync::Arc;

use shakmaty::{Chess, Color, Position};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use chess_core::rules;

use crate::engine::AnalysisEngine;
use crate::error::AnalysisError;
use crate::evaluation::Evaluation;
use crate::sink::EvaluationSink;

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    DepthReached,
    /// The engine finished its search below the target depth.
    Exhausted,
    Cancelled,
    Fault,
}

/// The position and depth a session analyzes.
#[derive(Debug, Clone)]
pub struct AnalysisTarget {
    pub fen: String,
    pub turn: Color,
    pub depth: u32,
}

struct ActiveSession {
    cancel: watch::Sender<bool>,
    handle: JoinHandle<SessionEnd>,
    target: AnalysisTarget,
}

pub struct AnalysisCoordinator<E: AnalysisEngine> {
    engine: Arc<Mutex<E>>,
    sink: Arc<dyn EvaluationSink>,
    latest: Arc<watch::Sender<Option<Evaluation>>>,
    session: Option<ActiveSession>,
}

impl<E: AnalysisEngine> AnalysisCoordinator<E> {
    pub fn new(engine: E, sink: Arc<dyn EvaluationSink>) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            engine: Arc::new(Mutex::new(engine)),
            sink,
            latest: Arc::new(latest),
            session: None,
        }
    }

    /// Whether a session is still streaming.
    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| !s.handle.is_finished())
    }

    /// Target of the most recently started session, running or not.
    pub fn target(&self) -> Option<&AnalysisTarget> {
        self.session.as_ref().map(|s| &s.target)
    }

    /// Latest record forwarded by the most recent session.
    pub fn last_evaluation(&self) -> Option<Evaluation> {
        self.latest.borrow().clone()
    }

    /// Start analyzing `position` up to `depth`. Fails if a session is still
    /// running; go through `restart` to replace one.
    pub fn start(&mut self, position: &Chess, depth: u32) -> Result<(), AnalysisError> {
        if self.is_running() {
            return Err(AnalysisError::SessionActive);
        }

        let target = AnalysisTarget {
            fen: rules::to_fen(position),
            turn: position.turn(),
            depth,
        };
        info!(fen = %target.fen, depth, "Starting analysis");

        self.latest.send_replace(None);
        let (cancel, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run_session(
            Arc::clone(&self.engine),
            target.clone(),
            cancel_rx,
            Arc::clone(&self.sink),
            Arc::clone(&self.latest),
        ));

        self.session = Some(ActiveSession {
            cancel,
            handle,
            target,
        });
        Ok(())
    }

    /// Cancel the current session and wait for its task to exit. A no-op
    /// when nothing was started.
    pub async fn stop(&mut self) -> Option<SessionEnd> {
        let session = self.session.take()?;
        let _ = session.cancel.send(true);

        let end = match session.handle.await {
            Ok(end) => end,
            Err(e) => {
                warn!(error = %e, "Analysis task did not complete cleanly");
                SessionEnd::Fault
            }
        };
        debug!(?end, fen = %session.target.fen, "Analysis stopped");
        Some(end)
    }

    pub async fn restart(&mut self, position: &Chess, depth: u32) -> Result<(), AnalysisError> {
        self.stop().await;
        self.start(position, depth)
    }

    /// Stop any session and shut the engine process down.
    pub async fn shutdown(&mut self) {
        self.stop().await;
        self.engine.lock().await.shutdown().await;
    }
}

async fn run_session<E: AnalysisEngine>(
    engine: Arc<Mutex<E>>,
    target: AnalysisTarget,
    mut cancel: watch::Receiver<bool>,
    sink: Arc<dyn EvaluationSink>,
    latest: Arc<watch::Sender<Option<Evaluation>>>,
) -> SessionEnd {
    let mut engine = engine.lock().await;
    let cancelled = *cancel.borrow_and_update();
    if cancelled {
        return SessionEnd::Cancelled;
    }

    if let Err(e) = engine.start(&target.fen, target.depth).await {
        warn!(error = %e, "Failed to start analysis");
        return SessionEnd::Fault;
    }

    loop {
        // A dropped sender counts as cancellation too.
        let next = tokio::select! {
            biased;
            _ = cancel.changed() => None,
            next = engine.next_info() => Some(next),
        };

        let info = match next {
            None => {
                if let Err(e) = engine.stop().await {
                    warn!(error = %e, "Engine fault while stopping analysis");
                }
                return SessionEnd::Cancelled;
            }
            Some(Ok(Some(info))) => info,
            Some(Ok(None)) => return SessionEnd::Exhausted,
            Some(Err(e)) => {
                warn!(error = %e, fen = %target.fen, "Engine fault during analysis");
                return SessionEnd::Fault;
            }
        };

        let reached = info.depth >= target.depth;
        let evaluation = Evaluation::from_info(info, target.turn, &target.fen);
        sink.on_evaluation(&evaluation);
        latest.send_replace(Some(evaluation));

        if reached {
            if let Err(e) = engine.stop().await {
                warn!(error = %e, "Engine fault while finishing analysis");
            }
            return SessionEnd::DepthReached;
        }
    }
}
