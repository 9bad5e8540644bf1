//! Corpus fragments
//!
//! A fragment is one preprocessed LaTeX expression belonging to a
//! document: the opaque id the store assigned it, the raw source the
//! serializer echoes back verbatim, and the token forest the index
//! measures distances on.

use crate::latex::Forest;
use serde::{Deserialize, Serialize};

/// One corpus unit: a preprocessed LaTeX expression within a document
///
/// `fragment_id` is opaque and preserved bit-exactly for external IO.
/// Fragments are immutable once built; deletion happens in the index as
/// tombstones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// Opaque store-assigned id
    pub fragment_id: String,
    /// Raw LaTeX source, echoed verbatim in responses
    pub source: String,
    /// Preprocessed token forest
    pub tokens: Forest,
}

impl Fragment {
    /// Create a fragment
    pub fn new(
        fragment_id: impl Into<String>,
        source: impl Into<String>,
        tokens: Forest,
    ) -> Self {
        Fragment {
            fragment_id: fragment_id.into(),
            source: source.into(),
            tokens,
        }
    }
}
