//! renfa: regex analysis built on NFAs whose edges carry character sets.
//!
//! The centerpiece is an NFA represented as a directed labelled graph: edges
//! carry [`CharSet`]s (unions of disjoint code-point ranges) instead of single
//! symbols, which keeps automata over large Unicode alphabets compact. On top
//! of the graph sit the algebraic constructions (union, concatenation,
//! quantification), a product construction for intersection, an AST-to-NFA
//! compiler, a word-list trie builder, and a DFA adapter.
//!
//! The engine is single-threaded and synchronous. NFAs are mutable; callers
//! needing parallelism must work on independent copies.

pub mod automaton;
pub mod charset;
pub mod regexp;

use std::fmt;

pub use automaton::{DfaSource, Nfa, NfaOptions};
pub use charset::{CharRange, CharSet};

/// Errors reported by the engine.
///
/// All failures are fatal within the operation that reports them; unless an
/// operation documents otherwise, the automaton's state afterwards is
/// unspecified and callers should discard it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenfaError {
    /// Attempt to link or unlink nodes belonging to different node lists.
    CrossListLink,
    /// Attempt to create an edge labelled with an empty character set.
    EmptyLabel,
    /// `unlink` called on a pair of nodes with no edge between them.
    MissingEdge,
    /// Operation combined automata or character classes with unequal
    /// `max_character` alphabets.
    AlphabetMismatch { left: u32, right: u32 },
    /// Numeric bound out of order or outside the alphabet.
    InvalidRange(String),
    /// Code point outside `[0, max_character]` in word-set construction.
    InvalidCodePoint { code_point: u32, maximum: u32 },
    /// The regex AST contained a construct the engine does not support.
    UnsupportedConstruct(&'static str),
    /// Reachability pruning attempted to remove the initial node. Indicates
    /// a caller bug.
    InitialRemoval,
}

impl fmt::Display for RenfaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenfaError::CrossListLink => {
                write!(f, "nodes belong to different node lists")
            }
            RenfaError::EmptyLabel => write!(f, "edge label must not be empty"),
            RenfaError::MissingEdge => write!(f, "no such edge"),
            RenfaError::AlphabetMismatch { left, right } => {
                write!(f, "alphabet mismatch: {:#x} vs {:#x}", left, right)
            }
            RenfaError::InvalidRange(msg) => write!(f, "invalid range: {}", msg),
            RenfaError::InvalidCodePoint { code_point, maximum } => {
                write!(
                    f,
                    "invalid code point: {:#x} outside [0, {:#x}]",
                    code_point, maximum
                )
            }
            RenfaError::UnsupportedConstruct(what) => {
                write!(f, "unsupported construct: {}", what)
            }
            RenfaError::InitialRemoval => {
                write!(f, "pruning attempted to remove the initial node")
            }
        }
    }
}

impl std::error::Error for RenfaError {}
