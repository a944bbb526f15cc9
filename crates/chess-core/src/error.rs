//! Error types for the variation tree, rules adapter and opening corpus

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),

    #[error("Invalid move notation: {0}")]
    InvalidMove(String),

    #[error("Invalid FEN: {0}")]
    InvalidFen(String),

    #[error("Invalid PGN: {0}")]
    InvalidPgn(String),

    /// The cursor names a move with no matching child at this ply.
    #[error("Cursor diverged from tree at ply {0}")]
    CursorDiverged(usize),

    #[error("Opening corpus not found at {path}: {source}")]
    CorpusNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed opening corpus at line {line}: {reason}")]
    MalformedCorpus { line: usize, reason: String },
}
