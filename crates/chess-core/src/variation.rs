//! Branching move history with a cursor.
//!
//! The tree owns its nodes outright (each node owns its children), and the
//! cursor is the list of moves from the root to the displayed node. The
//! cursor only ever grows through `play`/`navigate_forward`, which follow or
//! create an edge, so it always names an existing chain of nodes.

use std::fmt;

use serde::Serialize;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color, Position};

use crate::error::CoreError;
use crate::rules;

/// Engine score attached to a node, from White's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    /// Centipawns divided by 100.
    Pawns(f64),
    /// Mate in N; negative when Black mates.
    Mate(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodeEval {
    pub score: Score,
    pub depth: u32,
}

/// One ply of the game.
#[derive(Debug, Clone, Default)]
pub struct VariationNode {
    mv: Option<UciMove>,
    san: Option<String>,
    children: Vec<VariationNode>,
    comment: Option<String>,
    eval: Option<NodeEval>,
}

impl VariationNode {
    fn new(mv: UciMove, san: String) -> Self {
        Self {
            mv: Some(mv),
            san: Some(san),
            ..Self::default()
        }
    }

    /// The move that produced this node; `None` for the root.
    pub fn mv(&self) -> Option<&UciMove> {
        self.mv.as_ref()
    }

    pub fn san(&self) -> Option<&str> {
        self.san.as_deref()
    }

    /// Children in order; the first one is the mainline continuation.
    pub fn children(&self) -> &[VariationNode] {
        &self.children
    }

    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    pub fn evaluation(&self) -> Option<NodeEval> {
        self.eval
    }

    fn child_index(&self, mv: &UciMove) -> Option<usize> {
        self.children.iter().position(|c| c.mv.as_ref() == Some(mv))
    }

    fn view(&self) -> TreeView {
        TreeView {
            name: self.san.clone().unwrap_or_else(|| ROOT_LABEL.to_string()),
            uci: self.mv.as_ref().map(|m| m.to_string()),
            children: self.children.iter().map(VariationNode::view).collect(),
        }
    }
}

const ROOT_LABEL: &str = "start";

/// Serialized shape of the tree, as pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeView {
    pub name: String,
    #[serde(rename = "move", skip_serializing_if = "Option::is_none")]
    pub uci: Option<String>,
    pub children: Vec<TreeView>,
}

/// Canonical rendering used as the tree fingerprint, e.g.
/// `root(e2e4(e7e5 g8f6))`.
impl fmt::Display for TreeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uci.as_deref().unwrap_or("root"))?;
        if !self.children.is_empty() {
            f.write_str("(")?;
            for (i, child) in self.children.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{child}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct VariationTree {
    start: Chess,
    root: VariationNode,
    cursor: Vec<UciMove>,
}

impl Default for VariationTree {
    fn default() -> Self {
        Self::new()
    }
}

impl VariationTree {
    /// Empty tree from the standard starting position.
    pub fn new() -> Self {
        Self::from_position(Chess::default())
    }

    pub fn from_fen(fen: &str) -> Result<Self, CoreError> {
        Ok(Self::from_position(rules::from_fen(fen)?))
    }

    pub fn from_position(start: Chess) -> Self {
        Self {
            start,
            root: VariationNode::default(),
            cursor: Vec::new(),
        }
    }

    pub fn root(&self) -> &VariationNode {
        &self.root
    }

    pub fn start_position(&self) -> &Chess {
        &self.start
    }

    /// Moves from the root to the displayed node.
    pub fn cursor(&self) -> &[UciMove] {
        &self.cursor
    }

    pub fn current_node(&self) -> Result<&VariationNode, CoreError> {
        let mut node = &self.root;
        for (ply, mv) in self.cursor.iter().enumerate() {
            let idx = node.child_index(mv).ok_or(CoreError::CursorDiverged(ply))?;
            node = &node.children[idx];
        }
        Ok(node)
    }

    fn current_node_mut(&mut self) -> Result<&mut VariationNode, CoreError> {
        walk_mut(&mut self.root, &self.cursor)
    }

    /// The displayed position, replayed from the start through the cursor.
    pub fn current_position(&self) -> Result<Chess, CoreError> {
        let mut pos = self.start.clone();
        for mv in &self.cursor {
            pos = rules::apply(&pos, mv)?.0;
        }
        Ok(pos)
    }

    pub fn current_fen(&self) -> Result<String, CoreError> {
        Ok(rules::to_fen(&self.current_position()?))
    }

    /// Play `mv` from the current node. An existing child with the same move
    /// is followed; otherwise a legal move becomes a new last child. Sibling
    /// order is never changed here.
    pub fn play(&mut self, mv: &UciMove) -> Result<UciMove, CoreError> {
        let pos = self.current_position()?;
        let (_, canonical) = rules::apply(&pos, mv)?;

        let node = self.current_node_mut()?;
        if node.child_index(&canonical).is_none() {
            let san = rules::to_san(&pos, &canonical)?;
            node.children.push(VariationNode::new(canonical.clone(), san));
        }

        self.cursor.push(canonical.clone());
        Ok(canonical)
    }

    /// Step onto the mainline child, if any.
    pub fn navigate_forward(&mut self) -> Result<Option<UciMove>, CoreError> {
        let next = self
            .current_node()?
            .children
            .first()
            .and_then(|child| child.mv.clone());
        if let Some(mv) = &next {
            self.cursor.push(mv.clone());
        }
        Ok(next)
    }

    pub fn navigate_backward(&mut self) -> Option<UciMove> {
        self.cursor.pop()
    }

    /// Drop every node and return to the start position.
    pub fn reset(&mut self) {
        self.root = VariationNode::default();
        self.cursor.clear();
    }

    pub fn serialize(&self) -> TreeView {
        self.root.view()
    }

    /// Tree-shape fingerprint. The cursor is not part of it.
    pub fn fingerprint(&self) -> String {
        self.serialize().to_string()
    }

    /// Moves along first children from the root.
    pub fn mainline_moves(&self) -> Vec<UciMove> {
        let mut moves = Vec::new();
        let mut node = &self.root;
        while let Some(child) = node.children.first() {
            moves.extend(child.mv.clone());
            node = child;
        }
        moves
    }

    /// Mainline as opening-corpus tokens (`["1.e4", "e5", "2.Nf3"]`).
    pub fn opening_tokens(&self) -> Result<Vec<String>, CoreError> {
        let mut tokens = Vec::new();
        let mut pos = self.start.clone();
        let mut node = &self.root;
        while let Some(child) = node.children.first() {
            let (Some(mv), Some(san)) = (&child.mv, &child.san) else {
                break;
            };
            tokens.push(rules::decorate(&pos, san));
            pos = rules::apply(&pos, mv)?.0;
            node = child;
        }
        Ok(tokens)
    }

    /// Set (or clear, with `None`) the comment on the current node.
    pub fn annotate(&mut self, comment: Option<String>) -> Result<(), CoreError> {
        self.current_node_mut()?.comment = comment.filter(|c| !c.trim().is_empty());
        Ok(())
    }

    /// Attach an evaluation to the node reached by `path` from the root.
    pub fn set_evaluation_at(&mut self, path: &[UciMove], eval: NodeEval) -> Result<(), CoreError> {
        walk_mut(&mut self.root, path)?.eval = Some(eval);
        Ok(())
    }

    /// Move the current node to the front of its siblings so it becomes the
    /// mainline. Returns whether the order changed.
    pub fn promote_to_mainline(&mut self) -> Result<bool, CoreError> {
        let Some((last, parent_path)) = self.cursor.split_last() else {
            return Ok(false);
        };

        let parent = walk_mut(&mut self.root, parent_path)?;
        let idx = parent
            .child_index(last)
            .ok_or(CoreError::CursorDiverged(parent_path.len()))?;
        if idx == 0 {
            return Ok(false);
        }
        let node = parent.children.remove(idx);
        parent.children.insert(0, node);
        Ok(true)
    }

    /// Replay a SAN line from the start position, following or creating
    /// nodes like `play`. On failure the cursor is left where it was; nodes
    /// created before the failing move are kept.
    pub fn load_san_line<S: AsRef<str>>(&mut self, moves: &[S]) -> Result<(), CoreError> {
        let saved = std::mem::take(&mut self.cursor);
        let mut pos = self.start.clone();

        for san in moves {
            let step = rules::san_to_uci(&pos, san.as_ref())
                .and_then(|uci| self.play(&uci))
                .and_then(|uci| rules::apply(&pos, &uci));
            match step {
                Ok((next, _)) => pos = next,
                Err(e) => {
                    self.cursor = saved;
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// PGN movetext for the whole tree: side lines in parentheses, comments
    /// in braces, terminated by `*`.
    pub fn to_pgn(&self) -> Result<String, CoreError> {
        let mut out = String::new();
        if let Some(comment) = &self.root.comment {
            push_token(&mut out, &format!("{{{comment}}}"));
        }
        write_line(&mut out, &self.root, &self.start, true)?;
        push_token(&mut out, "*");
        Ok(out)
    }
}

fn walk_mut<'a>(
    root: &'a mut VariationNode,
    path: &[UciMove],
) -> Result<&'a mut VariationNode, CoreError> {
    let mut node = root;
    for (ply, mv) in path.iter().enumerate() {
        let idx = node.child_index(mv).ok_or(CoreError::CursorDiverged(ply))?;
        node = &mut node.children[idx];
    }
    Ok(node)
}

fn push_token(out: &mut String, token: &str) {
    if !out.is_empty() && !out.ends_with('(') {
        out.push(' ');
    }
    out.push_str(token);
}

/// Emit one move (numbered when needed) and its comment. Returns whether the
/// next move must repeat its number.
fn write_move(out: &mut String, pos: &Chess, node: &VariationNode, numbered: bool) -> bool {
    let san = node.san.as_deref().unwrap_or("--");
    let token = match pos.turn() {
        Color::White => format!("{}. {san}", pos.fullmoves()),
        Color::Black if numbered => format!("{}... {san}", pos.fullmoves()),
        Color::Black => san.to_string(),
    };
    push_token(out, &token);

    match &node.comment {
        Some(comment) => {
            push_token(out, &format!("{{{comment}}}"));
            true
        }
        None => false,
    }
}

fn write_line(
    out: &mut String,
    parent: &VariationNode,
    pos: &Chess,
    mut numbered: bool,
) -> Result<(), CoreError> {
    let mut parent = parent;
    let mut pos = pos.clone();

    while let Some(main) = parent.children.first() {
        numbered = write_move(out, &pos, main, numbered);

        for side in &parent.children[1..] {
            push_token(out, "(");
            let side_numbered = write_move(out, &pos, side, true);
            if let Some(mv) = &side.mv {
                let after = rules::apply(&pos, mv)?.0;
                write_line(out, side, &after, side_numbered)?;
            }
            out.push(')');
            numbered = true;
        }

        if let Some(mv) = &main.mv {
            pos = rules::apply(&pos, mv)?.0;
        }
        parent = main;
    }
    Ok(())
}
