//! LaTeX token and forest model
//!
//! A preprocessed LaTeX fragment is an ordered sequence of labeled trees:
//! plain text runs and commands with argument forests. The model is
//! immutable after parsing; equality is structural.
//!
//! ## Cost
//!
//! The cost of a token is 1 for text and 1 + cost(children) for a command;
//! the cost of a forest is the sum of its token costs. Cost equals the
//! total node count, which is also the length of the preorder flattening.
//!
//! ## Flattening
//!
//! The edit-distance kernel works on [`TermSeq`], the preorder label
//! sequence of a forest together with the start offset of every top-level
//! suffix. Deleting a token promotes its children to siblings, so dropping
//! a head token is exactly advancing one position in preorder; a suffix of
//! the preorder sequence is therefore the structural identity of the
//! remaining forest.
//!
//! ## Wire format
//!
//! The preprocessor and the document store ship forests as JSON: a forest
//! is an array, a token is either a string (text) or an object
//! `{"cmd": name, "args": [token…]}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single LaTeX element: a text run or a command with arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Token {
    /// A plain text run
    Text(String),
    /// A command with its argument forest
    Command {
        /// Command name (without the backslash)
        name: String,
        /// Argument forest
        children: Forest,
    },
}

impl Token {
    /// The label used by the edit-distance metric
    ///
    /// Text and commands share one label space: `Text("x")` and
    /// `Command("x", [])` carry the same label.
    pub fn label(&self) -> &str {
        match self {
            Token::Text(s) => s,
            Token::Command { name, .. } => name,
        }
    }

    /// Cost of this token: 1 plus the cost of its children
    pub fn cost(&self) -> usize {
        match self {
            Token::Text(_) => 1,
            Token::Command { children, .. } => 1 + children.cost(),
        }
    }
}

/// An ordered sequence of tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Forest {
    tokens: Vec<Token>,
}

impl Forest {
    /// Create a forest from tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Forest { tokens }
    }

    /// The empty forest
    pub fn empty() -> Self {
        Forest { tokens: Vec::new() }
    }

    /// Top-level token count
    pub fn top_level_len(&self) -> usize {
        self.tokens.len()
    }

    /// Check if there are no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Total cost: the sum of token costs, equal to the node count
    pub fn cost(&self) -> usize {
        self.tokens.iter().map(Token::cost).sum()
    }

    /// The top-level tokens
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// All suffix forests, from the full forest down to the empty one
    ///
    /// `suffixes()[i]` is this forest with its first `i` top-level tokens
    /// removed; the result always has `top_level_len() + 1` entries.
    pub fn suffixes(&self) -> Vec<Forest> {
        (0..=self.tokens.len())
            .map(|i| Forest::new(self.tokens[i..].to_vec()))
            .collect()
    }
}

/// Preorder flattening of a forest, with top-level suffix offsets
///
/// `terms` is the preorder label sequence; `suffix_starts[i]` is the
/// offset at which the `i`-th top-level suffix begins, so
/// `suffix_starts.len() == top_level_len + 1` and the last entry equals
/// `terms.len()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TermSeq {
    terms: Vec<String>,
    suffix_starts: Vec<u32>,
}

impl TermSeq {
    /// Flatten a forest into its preorder term sequence
    pub fn from_forest(forest: &Forest) -> Self {
        let mut terms = Vec::with_capacity(forest.cost());
        let mut suffix_starts = Vec::with_capacity(forest.top_level_len() + 1);
        for token in forest.tokens() {
            suffix_starts.push(terms.len() as u32);
            flatten_token(token, &mut terms);
        }
        suffix_starts.push(terms.len() as u32);
        TermSeq {
            terms,
            suffix_starts,
        }
    }

    /// The preorder labels
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Cost of the flattened forest (node count)
    pub fn cost(&self) -> usize {
        self.terms.len()
    }

    /// Number of suffix forests, `top_level_len + 1`
    pub fn suffix_count(&self) -> usize {
        self.suffix_starts.len()
    }

    /// Start offsets of the top-level suffixes, ascending
    pub fn suffix_starts(&self) -> impl Iterator<Item = usize> + '_ {
        self.suffix_starts.iter().map(|&s| s as usize)
    }
}

impl From<&Forest> for TermSeq {
    fn from(forest: &Forest) -> Self {
        TermSeq::from_forest(forest)
    }
}

fn flatten_token(token: &Token, out: &mut Vec<String>) {
    out.push(token.label().to_string());
    if let Token::Command { children, .. } = token {
        for child in children.tokens() {
            flatten_token(child, out);
        }
    }
}

/// Errors from parsing the forest wire format
#[derive(Debug, Error)]
pub enum ForestParseError {
    /// A forest must be a JSON array
    #[error("forest must be a JSON array")]
    NotAnArray,
    /// A command object needs a string `cmd` field
    #[error("command token is missing a string \"cmd\" field")]
    MissingCommandName,
    /// Token was neither a string nor a command object
    #[error("unsupported token shape: {0}")]
    UnsupportedToken(String),
}

/// Parse a forest from its JSON wire format
pub fn parse_forest(value: &serde_json::Value) -> Result<Forest, ForestParseError> {
    let items = value.as_array().ok_or(ForestParseError::NotAnArray)?;
    let tokens = items
        .iter()
        .map(parse_token)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Forest::new(tokens))
}

fn parse_token(value: &serde_json::Value) -> Result<Token, ForestParseError> {
    match value {
        serde_json::Value::String(s) => Ok(Token::Text(s.clone())),
        serde_json::Value::Object(map) => {
            let name = map
                .get("cmd")
                .and_then(|v| v.as_str())
                .ok_or(ForestParseError::MissingCommandName)?;
            let children = match map.get("args") {
                Some(args) => parse_forest(args)?,
                None => Forest::empty(),
            };
            Ok(Token::Command {
                name: name.to_string(),
                children,
            })
        }
        other => Err(ForestParseError::UnsupportedToken(format!("{}", other))),
    }
}
