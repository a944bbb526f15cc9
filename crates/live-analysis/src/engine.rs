//! The seam between the coordinator and an analysis process.

use std::future::Future;

use crate::error::AnalysisError;

/// Score as reported by the engine, relative to the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawScore {
    Cp(i32),
    Mate(i32),
}

/// One streamed analysis record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub depth: u32,
    pub score: RawScore,
    /// Principal variation in UCI notation
    pub pv: Vec<String>,
}

/// A long-lived engine process that analyzes one position at a time.
///
/// `next_info` must be cancel safe: the coordinator races it against a
/// cancellation signal and drops the future when cancellation wins.
pub trait AnalysisEngine: Send + 'static {
    /// Begin analyzing `fen` up to `depth` plies.
    fn start(
        &mut self,
        fen: &str,
        depth: u32,
    ) -> impl Future<Output = Result<(), AnalysisError>> + Send;

    /// Next record of the running search, or `None` once it has finished.
    fn next_info(
        &mut self,
    ) -> impl Future<Output = Result<Option<EngineInfo>, AnalysisError>> + Send;

    /// Halt the running search and wait until the engine is idle.
    fn stop(&mut self) -> impl Future<Output = Result<(), AnalysisError>> + Send;

    fn shutdown(&mut self) -> impl Future<Output = ()> + Send;
}
