//! Core types for TeXSearch
//!
//! This crate defines the foundational types used throughout the system:
//! - Token/Forest: immutable model of a preprocessed LaTeX fragment
//! - TermSeq: preorder flattening the edit-distance kernel runs on
//! - Fragment: one corpus unit (id, source, tokens)
//! - TexError: unified error type with kind/code classification

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod fragment;
pub mod latex;

pub use error::{ErrorKind, Result, TexError};
pub use fragment::Fragment;
pub use latex::{parse_forest, Forest, ForestParseError, TermSeq, Token};
