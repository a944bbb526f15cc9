//! PGN parsing, lightweight and regex based.
//!
//! Side lines in parentheses become sibling branches and `{...}` comments
//! attach to the move they follow, so a tree exported with
//! `VariationTree::to_pgn` loads back unchanged.

use std::sync::LazyLock;

use regex::Regex;
use shakmaty::uci::UciMove;

use crate::error::CoreError;
use crate::rules;
use crate::variation::VariationTree;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).unwrap());
static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]*)\}|;[^\n]*|\(|\)|\$\d+|[^\s(){};]+").unwrap());
static MOVE_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.+").unwrap());
/// Promotion written without `=` (`e8Q`, `exd1N+`).
static BARE_PROMOTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-h](?:x[a-h])?[18])([QRBN])").unwrap());

const RESULTS: [&str; 4] = ["1-0", "0-1", "1/2-1/2", "*"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgnToken {
    /// SAN with move numbers removed and castling/promotion spelled the
    /// standard way.
    Move(String),
    Comment(String),
    OpenVariation,
    CloseVariation,
}

#[derive(Debug, Clone, Default)]
pub struct PgnGame {
    /// Tag pairs in file order.
    pub headers: Vec<(String, String)>,
    pub tokens: Vec<PgnToken>,
}

impl PgnGame {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Split a PGN into tag pairs and movetext tokens. Move numbers, NAGs,
/// results and `;` comments are dropped.
pub fn parse_pgn(pgn: &str) -> PgnGame {
    let headers = HEADER_RE
        .captures_iter(pgn)
        .map(|cap| (cap[1].to_string(), cap[2].to_string()))
        .collect();
    let movetext = HEADER_RE.replace_all(pgn, "");

    PgnGame {
        headers,
        tokens: tokenize(&movetext),
    }
}

/// Build the whole game tree. A `FEN` tag sets the start position; the
/// cursor ends on the last mainline move.
pub fn load_pgn(pgn: &str) -> Result<VariationTree, CoreError> {
    let game = parse_pgn(pgn);
    let mut tree = match game.header("FEN") {
        Some(fen) => VariationTree::from_fen(fen)?,
        None => VariationTree::new(),
    };

    // Where to resume once the open variation closes.
    let mut resume: Vec<Vec<UciMove>> = Vec::new();
    for token in game.tokens {
        match token {
            PgnToken::Move(san) => {
                let uci = rules::san_to_uci(&tree.current_position()?, &san)?;
                tree.play(&uci)?;
            }
            PgnToken::Comment(text) => tree.annotate(Some(text))?,
            PgnToken::OpenVariation => {
                resume.push(tree.cursor().to_vec());
                if tree.navigate_backward().is_none() {
                    return Err(CoreError::InvalidPgn("variation before the first move".into()));
                }
            }
            PgnToken::CloseVariation => {
                let path = resume
                    .pop()
                    .ok_or_else(|| CoreError::InvalidPgn("unbalanced ')'".into()))?;
                return_to(&mut tree, &path)?;
            }
        }
    }

    if !resume.is_empty() {
        return Err(CoreError::InvalidPgn("unclosed variation".into()));
    }
    Ok(tree)
}

fn tokenize(movetext: &str) -> Vec<PgnToken> {
    let mut tokens = Vec::new();
    for cap in TOKEN_RE.captures_iter(movetext) {
        if let Some(comment) = cap.get(1) {
            tokens.push(PgnToken::Comment(comment.as_str().trim().to_string()));
            continue;
        }
        let raw = &cap[0];
        match raw {
            "(" => tokens.push(PgnToken::OpenVariation),
            ")" => tokens.push(PgnToken::CloseVariation),
            _ if raw.starts_with([';', '$']) || RESULTS.contains(&raw) => {}
            _ => {
                let san = MOVE_NUMBER_RE.replace(raw, "");
                // Bare move numbers and detached annotation glyphs.
                if san.chars().any(|c| c.is_ascii_alphanumeric()) {
                    tokens.push(PgnToken::Move(normalize_san(&san)));
                }
            }
        }
    }
    tokens
}

fn normalize_san(san: &str) -> String {
    let san = san.replace("0-0-0", "O-O-O").replace("0-0", "O-O");
    BARE_PROMOTION_RE.replace(&san, "$1=$2").into_owned()
}

/// Walk the cursor back to the longest common prefix with `path`, then
/// follow `path` down again.
fn return_to(tree: &mut VariationTree, path: &[UciMove]) -> Result<(), CoreError> {
    while !path.starts_with(tree.cursor()) {
        tree.navigate_backward();
    }
    let from = tree.cursor().len();
    for mv in &path[from..] {
        tree.play(mv)?;
    }
    Ok(())
}
