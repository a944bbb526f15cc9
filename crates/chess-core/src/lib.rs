pub mod change;
pub mod error;
pub mod opening_trie;
pub mod pgn;
pub mod rules;
pub mod variation;

pub use shakmaty;

pub use change::ChangeDetector;
pub use error::CoreError;
pub use opening_trie::{Opening, OpeningTrie};
pub use variation::{NodeEval, Score, TreeView, VariationNode, VariationTree};
