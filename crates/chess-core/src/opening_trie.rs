//! Opening detection by longest known prefix.
//!
//! The corpus is a text file of records in the SCID `.eco` style:
//!
//! ```text
//! C60 "Ruy Lopez" 1.e4 e5 2.Nf3 Nc6 3.Bb5 *
//! ```
//!
//! A record may wrap over several lines and ends at `*`. Move tokens for
//! White carry the move number, Black's don't.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error::CoreError;

static RECORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*(\S+)\s*"([^"]+)"([^"]*)$"#).unwrap());

/// A named opening line from the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Opening {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    openings: Vec<Opening>,
}

impl TrieNode {
    fn insert(&mut self, moves: &[String], opening: Opening) {
        let mut node = self;
        for token in moves {
            node = node.children.entry(token.clone()).or_default();
        }
        node.openings.push(opening);
    }
}

/// Read-only trie over the opening corpus.
#[derive(Debug, Default)]
pub struct OpeningTrie {
    root: TrieNode,
    records: usize,
}

impl OpeningTrie {
    /// Load and parse a corpus file. Any failure is fatal: the trie never
    /// serves a partially loaded corpus.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CoreError::CorpusNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let mut trie = Self::default();
        let mut record = String::new();
        let mut record_line = 0;

        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if record.trim().is_empty() {
                record.clear();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                record_line = idx + 1;
            }
            record.push(' ');
            record.push_str(trimmed);

            // A line may close one record and start (or hold) the next.
            while let Some(end) = record.find('*') {
                let (code, name, moves) = parse_record(&record[..end], record_line)?;
                trie.root.insert(&moves, Opening { code, name });
                trie.records += 1;
                record.drain(..=end);
                record_line = idx + 1;
            }
        }

        if !record.trim().is_empty() {
            return Err(CoreError::MalformedCorpus {
                line: record_line,
                reason: "record is missing its '*' terminator".into(),
            });
        }

        Ok(trie)
    }

    /// Number of corpus records loaded.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Walk `moves` down the trie and return the openings attached to the
    /// deepest node reached that has any.
    pub fn find_opening<S: AsRef<str>>(&self, moves: &[S]) -> Option<&[Opening]> {
        let mut node = &self.root;
        let mut best = (!node.openings.is_empty()).then_some(node.openings.as_slice());

        for token in moves {
            match node.children.get(token.as_ref()) {
                Some(child) => {
                    node = child;
                    if !node.openings.is_empty() {
                        best = Some(node.openings.as_slice());
                    }
                }
                None => break,
            }
        }

        best
    }
}

fn parse_record(record: &str, line: usize) -> Result<(String, String, Vec<String>), CoreError> {
    let caps = RECORD_RE
        .captures(record)
        .ok_or_else(|| CoreError::MalformedCorpus {
            line,
            reason: format!("expected CODE \"Name\" moves, got `{}`", record.trim()),
        })?;

    let code = caps[1].to_string();
    let name = caps[2].trim().to_string();
    let moves = normalize_tokens(caps[3].split_whitespace());
    Ok((code, name, moves))
}

/// Glue a detached move number onto its move (`"1." "e4"` -> `"1.e4"`).
fn normalize_tokens<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut pending: Option<&str> = None;

    for token in raw {
        let is_number = token.len() > 1
            && token.ends_with('.')
            && token[..token.len() - 1].chars().all(|c| c.is_ascii_digit());
        if is_number {
            pending = Some(token);
            continue;
        }
        match pending.take() {
            Some(number) => tokens.push(format!("{number}{token}")),
            None => tokens.push(token.to_string()),
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = r#"
# sample corpus
C20 "King's Pawn Game" 1.e4 e5 *
C40 "King's Knight Opening" 1.e4 e5 2.Nf3 *
C44 "King's Pawn Game" 1.e4 e5 2.Nf3 Nc6 *
C60 "Ruy Lopez"
  1.e4 e5 2.Nf3 Nc6 3.Bb5 *
C65 "Ruy Lopez: Berlin Defence" 1.e4 e5 2.Nf3 Nc6 3.Bb5 Nf6 *
B00 "King's Pawn" 1. e4 *
"#;

    fn tokens(line: &str) -> Vec<&str> {
        line.split_whitespace().collect()
    }

    #[test]
    fn test_parse_counts_records() {
        let trie = OpeningTrie::parse(CORPUS).unwrap();
        assert_eq!(trie.len(), 6);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let trie = OpeningTrie::parse(CORPUS).unwrap();
        let found = trie
            .find_opening(&tokens("1.e4 e5 2.Nf3 Nc6 3.Bb5 a6 4.Ba4"))
            .unwrap();
        assert_eq!(found[0].code, "C60");
        assert_eq!(found[0].name, "Ruy Lopez");
    }

    #[test]
    fn test_detached_move_numbers_are_joined() {
        let trie = OpeningTrie::parse(CORPUS).unwrap();
        let found = trie.find_opening(&["1.e4"]).unwrap();
        assert_eq!(found, &[Opening { code: "B00".into(), name: "King's Pawn".into() }]);
    }

    #[test]
    fn test_unknown_line_returns_none() {
        let trie = OpeningTrie::parse(CORPUS).unwrap();
        assert!(trie.find_opening(&["1.a3"]).is_none());
        assert!(trie.find_opening::<&str>(&[]).is_none());
    }

    #[test]
    fn test_missing_terminator_is_malformed() {
        let err = OpeningTrie::parse("A00 \"Polish\" 1.b4\n").err().unwrap();
        assert!(matches!(err, CoreError::MalformedCorpus { line: 1, .. }));
    }

    #[test]
    fn test_missing_quotes_is_malformed() {
        let err = OpeningTrie::parse("C20\nC20 King 1.e4 *\n").err().unwrap();
        assert!(matches!(err, CoreError::MalformedCorpus { line: 1, .. }));
    }

    #[test]
    fn test_several_records_on_one_line() {
        let trie =
            OpeningTrie::parse("B00 \"King's Pawn\" 1.e4 * C20 \"Open Game\" 1.e4 e5 *\n").unwrap();
        assert_eq!(trie.len(), 2);
        assert_eq!(trie.find_opening(&["1.e4", "e5"]).unwrap()[0].code, "C20");
        assert_eq!(trie.find_opening(&["1.e4"]).unwrap()[0].code, "B00");
    }

    #[test]
    fn test_text_after_last_terminator_is_malformed() {
        let err = OpeningTrie::parse("B00 \"King's Pawn\" 1.e4 * trailing\n").err().unwrap();
        assert!(matches!(err, CoreError::MalformedCorpus { line: 1, .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = OpeningTrie::load("does/not/exist.eco").err().unwrap();
        assert!(matches!(err, CoreError::CorpusNotFound { .. }));
    }
}
