//! Analysis error types

use chess_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    Config(&'static str),

    #[error("Stockfish error: {0}")]
    Engine(String),

    #[error("An analysis session is already running")]
    SessionActive,

    #[error(transparent)]
    Core(#[from] CoreError),
}
