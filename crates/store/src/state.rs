//! Persistent index state
//!
//! The pair the snapshot file round-trips: the last applied update
//! sequence and the metric tree itself.

use std::path::Path;
use texsearch_core::{Result, TexError};
use texsearch_search::MetricTree;

/// The persistent index: update watermark plus the metric tree
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistentIndex {
    /// Sequence of the last applied update
    pub last_update: u64,
    /// The searchable tree
    pub tree: MetricTree,
}

impl PersistentIndex {
    /// A fresh, empty index at sequence zero
    pub fn empty() -> Self {
        PersistentIndex::default()
    }

    /// Load the index from its snapshot file
    pub fn load(path: &Path) -> Result<Self> {
        let (last_update, tree) = texsearch_durability::load(path)
            .map_err(|e| TexError::persistence(format!("{}: {}", path.display(), e)))?;
        Ok(PersistentIndex { last_update, tree })
    }

    /// Persist the index atomically to its snapshot file
    pub fn save(&self, path: &Path) -> Result<()> {
        texsearch_durability::save_atomic(path, self.last_update, &self.tree)
            .map_err(|e| TexError::persistence(format!("{}: {}", path.display(), e)))?;
        Ok(())
    }
}
