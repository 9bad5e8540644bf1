//! Approximate-nearest-neighbor search over LaTeX forests
//!
//! This crate holds the computational core of TeXSearch:
//! - the memoized tree edit-distance kernel (full, left-anchored, and the
//!   suffix-expanded index distance),
//! - the BK-style metric tree over fragment nodes,
//! - the resumable ranked search with its priority-queue frontier.

pub mod distance;
pub mod queue;
pub mod searcher;
pub mod tree;

pub use distance::{edit_distance, index_distance, left_edit_distance};
pub use queue::SearchQueue;
pub use searcher::{Match, Page, Search};
pub use tree::{IndexNode, MetricTree, BRANCH_SIZE, BUCKET_SIZE};
