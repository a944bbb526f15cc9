//! Move legality, application and notation, backed by shakmaty.
//!
//! Moves are carried around as canonical UCI tokens (standard castling
//! notation, e.g. `e1g1`), so two tokens for the same move always compare
//! equal.

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Position};

use crate::error::CoreError;

/// Parse a UCI token such as `e2e4` or `e7e8q`.
pub fn parse_uci(token: &str) -> Result<UciMove, CoreError> {
    token
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidMove(token.to_string()))
}

/// All legal moves in `pos`, as canonical UCI tokens.
pub fn legal_moves(pos: &Chess) -> Vec<UciMove> {
    pos.legal_moves()
        .iter()
        .map(|m| m.to_uci(CastlingMode::Standard))
        .collect()
}

/// Play `uci` on `pos`. Returns the successor position and the canonical token.
pub fn apply(pos: &Chess, uci: &UciMove) -> Result<(Chess, UciMove), CoreError> {
    let mv = uci
        .to_move(pos)
        .map_err(|_| CoreError::IllegalMove(uci.to_string()))?;
    let canonical = mv.to_uci(CastlingMode::Standard);
    let mut next = pos.clone();
    next.play_unchecked(mv);
    Ok((next, canonical))
}

pub fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

pub fn from_fen(fen: &str) -> Result<Chess, CoreError> {
    let parsed: Fen = fen
        .trim()
        .parse()
        .map_err(|_| CoreError::InvalidFen(fen.to_string()))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|_| CoreError::InvalidFen(fen.to_string()))
}

/// SAN for `uci` in `pos`, with the `+`/`#` suffix.
pub fn to_san(pos: &Chess, uci: &UciMove) -> Result<String, CoreError> {
    let mv = uci
        .to_move(pos)
        .map_err(|_| CoreError::IllegalMove(uci.to_string()))?;
    let san = San::from_move(pos, mv).to_string();

    let mut after = pos.clone();
    after.play_unchecked(mv);
    let suffix = if after.is_checkmate() {
        "#"
    } else if after.is_check() {
        "+"
    } else {
        ""
    };
    Ok(format!("{san}{suffix}"))
}

/// Resolve a SAN string (check suffixes allowed) to a canonical UCI token.
pub fn san_to_uci(pos: &Chess, san: &str) -> Result<UciMove, CoreError> {
    let stripped = san.trim_end_matches(['+', '#', '!', '?']);
    let parsed: San = stripped
        .parse()
        .map_err(|_| CoreError::InvalidMove(san.to_string()))?;
    let mv = parsed
        .to_move(pos)
        .map_err(|_| CoreError::IllegalMove(san.to_string()))?;
    Ok(mv.to_uci(CastlingMode::Standard))
}

/// Opening-corpus token for a move with SAN `san` played from `pos`:
/// White's moves carry the move number (`"3.Bb5"`), Black's don't.
pub fn decorate(pos: &Chess, san: &str) -> String {
    match pos.turn() {
        Color::White => format!("{}.{}", pos.fullmoves(), san),
        Color::Black => san.to_string(),
    }
}
