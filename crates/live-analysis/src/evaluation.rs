use chess_core::{NodeEval, Score};
use serde::Serialize;
use shakmaty::Color;

use crate::engine::{EngineInfo, RawScore};

/// A streamed evaluation, normalized to White's point of view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub score: Score,
    pub depth: u32,
    pub pv: Vec<String>,
    /// Position the record belongs to
    pub fen: String,
}

impl Evaluation {
    /// `turn` is the side to move in the analyzed position; engine scores
    /// are relative to it. Mate counts stay mate counts.
    pub fn from_info(info: EngineInfo, turn: Color, fen: &str) -> Self {
        let flip = turn == Color::Black;
        let score = match info.score {
            RawScore::Cp(cp) => {
                let pawns = f64::from(cp) / 100.0;
                Score::Pawns(if flip { -pawns } else { pawns })
            }
            RawScore::Mate(n) => Score::Mate(if flip { n.saturating_neg() } else { n }),
        };
        Self {
            score,
            depth: info.depth,
            pv: info.pv,
            fen: fen.to_string(),
        }
    }

    pub fn node_eval(&self) -> NodeEval {
        NodeEval {
            score: self.score,
            depth: self.depth,
        }
    }
}
