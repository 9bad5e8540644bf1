//! Metric-tree index over the fragment corpus
//!
//! A BK-tree keyed on the integer index distance. Every branch holds a
//! pivot node, an in-place bucket for nodes at pivot distance below
//! [`BUCKET_SIZE`], and one child slot per distance band of width
//! [`BUCKET_SIZE`], plus an overflow band. Branches live in an arena and
//! reference each other by integer id, which keeps the hot search loop on
//! contiguous memory instead of chasing pointers.
//!
//! Deletion is logical: pivots are tombstoned so their subtrees stay
//! reachable, bucket entries are removed outright. The reconciler replaces
//! whole documents at a time, so deletion is keyed by `doc_id`.
//!
//! The index distance is left-anchored and violates the triangle
//! inequality the band bounds assume; search completeness is therefore
//! empirical rather than proven. This is a deliberate, inherited
//! compromise.

use crate::distance::index_distance;
use serde::{Deserialize, Serialize};
use texsearch_core::{Forest, Fragment, TermSeq};

/// Width of one distance band; pivot distances below this go to the bucket
pub const BUCKET_SIZE: usize = 5;

/// Number of banded children; one more slot holds the overflow band
pub const BRANCH_SIZE: usize = 20;

const CHILD_SLOTS: usize = BRANCH_SIZE + 1;

/// Arena id of a branch
pub(crate) type BranchId = u32;

/// One indexed fragment: external ids plus the flattened term sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexNode {
    /// Document the fragment belongs to
    pub doc_id: String,
    /// Opaque fragment id within the document
    pub fragment_id: String,
    /// Preorder terms with top-level suffix offsets
    pub terms: TermSeq,
}

impl IndexNode {
    /// Build an index node from a forest
    pub fn new(doc_id: impl Into<String>, fragment_id: impl Into<String>, tokens: &Forest) -> Self {
        IndexNode {
            doc_id: doc_id.into(),
            fragment_id: fragment_id.into(),
            terms: TermSeq::from_forest(tokens),
        }
    }

    /// Build an index node from a corpus fragment
    pub fn from_fragment(doc_id: impl Into<String>, fragment: &Fragment) -> Self {
        IndexNode::new(doc_id, fragment.fragment_id.clone(), &fragment.tokens)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct Branch {
    pub(crate) pivot: IndexNode,
    pub(crate) tombstone: bool,
    pub(crate) bucket: Vec<IndexNode>,
    pub(crate) children: [Option<BranchId>; CHILD_SLOTS],
}

impl Branch {
    fn new(pivot: IndexNode) -> Self {
        Branch {
            pivot,
            tombstone: false,
            bucket: Vec::new(),
            children: [None; CHILD_SLOTS],
        }
    }
}

/// BK-tree over index nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricTree {
    branches: Vec<Branch>,
    root: Option<BranchId>,
}

impl MetricTree {
    /// Create an empty tree
    pub fn new() -> Self {
        MetricTree::default()
    }

    /// Check if the tree holds no nodes at all
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of live (non-tombstoned) entries
    pub fn len(&self) -> usize {
        self.branches
            .iter()
            .map(|b| usize::from(!b.tombstone) + b.bucket.len())
            .sum()
    }

    pub(crate) fn root(&self) -> Option<BranchId> {
        self.root
    }

    pub(crate) fn branch(&self, id: BranchId) -> &Branch {
        &self.branches[id as usize]
    }

    fn alloc(&mut self, node: IndexNode) -> BranchId {
        let id = self.branches.len() as BranchId;
        self.branches.push(Branch::new(node));
        id
    }

    /// Insert a node
    ///
    /// Descends by pivot distance: below [`BUCKET_SIZE`] the node joins
    /// the pivot's bucket, otherwise it continues into the child band
    /// `min(d / BUCKET_SIZE, BRANCH_SIZE)`.
    pub fn add(&mut self, node: IndexNode) {
        let Some(mut at) = self.root else {
            let id = self.alloc(node);
            self.root = Some(id);
            return;
        };
        loop {
            let d = index_distance(&node.terms, &self.branch(at).pivot.terms);
            if d < BUCKET_SIZE {
                self.branches[at as usize].bucket.push(node);
                return;
            }
            let band = (d / BUCKET_SIZE).min(BRANCH_SIZE);
            match self.branch(at).children[band] {
                Some(child) => at = child,
                None => {
                    let id = self.alloc(node);
                    self.branches[at as usize].children[band] = Some(id);
                    return;
                }
            }
        }
    }

    /// Logically delete every entry of a document
    ///
    /// Pivots are tombstoned in place (their subtrees stay reachable);
    /// bucket entries are filtered out. The sweep over the arena visits
    /// exactly the branches a recursion into every child band would.
    pub fn delete(&mut self, doc_id: &str) {
        let mut tombstoned = 0usize;
        let mut removed = 0usize;
        for branch in &mut self.branches {
            if branch.pivot.doc_id == doc_id && !branch.tombstone {
                branch.tombstone = true;
                tombstoned += 1;
            }
            let before = branch.bucket.len();
            branch.bucket.retain(|n| n.doc_id != doc_id);
            removed += before - branch.bucket.len();
        }
        if tombstoned + removed > 0 {
            tracing::debug!(doc_id, tombstoned, removed, "deleted document from index");
        }
    }

    /// Iterate all entries with their tombstone state
    ///
    /// Bucket entries are never tombstoned; deleted ones are gone.
    pub fn nodes(&self) -> impl Iterator<Item = (&IndexNode, bool)> {
        self.branches.iter().flat_map(|b| {
            std::iter::once((&b.pivot, b.tombstone))
                .chain(b.bucket.iter().map(|n| (n, false)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use texsearch_core::Token;

    fn run_forest(n: usize) -> Forest {
        Forest::new((0..n).map(|_| Token::Text("a".to_string())).collect())
    }

    fn run_node(doc: &str, frag: &str, n: usize) -> IndexNode {
        IndexNode::new(doc, frag, &run_forest(n))
    }

    #[test]
    fn test_empty_tree() {
        let tree = MetricTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert_eq!(tree.nodes().count(), 0);
    }

    #[test]
    fn test_add_first_node_becomes_root() {
        let mut tree = MetricTree::new();
        tree.add(run_node("d1", "f1", 3));
        assert!(!tree.is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_close_nodes_share_a_bucket() {
        let mut tree = MetricTree::new();
        tree.add(run_node("d1", "f1", 10));
        // Distance from an 8-run to a 10-run pivot is 0; it buckets.
        tree.add(run_node("d2", "f2", 8));
        assert_eq!(tree.branches.len(), 1);
        assert_eq!(tree.branch(0).bucket.len(), 1);
    }

    #[test]
    fn test_distant_node_opens_a_band() {
        let mut tree = MetricTree::new();
        tree.add(run_node("d1", "f1", 10));
        // A 22-run is at distance 12 from the 10-run pivot: band 2.
        tree.add(run_node("d2", "f2", 22));
        assert_eq!(tree.branches.len(), 2);
        assert_eq!(tree.branch(0).children[2], Some(1));
    }

    #[test]
    fn test_overflow_band() {
        let mut tree = MetricTree::new();
        tree.add(run_node("d1", "f1", 1));
        // Distance 299 lands beyond the last banded child.
        tree.add(run_node("d2", "f2", 300));
        assert_eq!(tree.branch(0).children[BRANCH_SIZE], Some(1));
    }

    #[test]
    fn test_band_invariant_holds() {
        let mut tree = MetricTree::new();
        let sizes = [40, 3, 17, 80, 55, 41, 44, 9, 120, 61, 38, 100];
        for (i, n) in sizes.iter().enumerate() {
            tree.add(run_node(&format!("d{}", i), "f", *n));
        }
        check_bands(&tree, tree.root().unwrap());
    }

    // Every node under child band i of a pivot must sit in that band's
    // distance range, tombstoned or not.
    fn check_bands(tree: &MetricTree, id: BranchId) {
        let branch = tree.branch(id);
        for entry in &branch.bucket {
            let d = index_distance(&entry.terms, &branch.pivot.terms);
            assert!(d < BUCKET_SIZE);
        }
        for (band, child) in branch.children.iter().enumerate() {
            let Some(child) = *child else { continue };
            let lo = band * BUCKET_SIZE;
            let hi = (band + 1) * BUCKET_SIZE;
            for (node, _) in subtree_nodes(tree, child) {
                let d = index_distance(&node.terms, &branch.pivot.terms);
                assert!(d >= lo, "distance {} below band [{}, {})", d, lo, hi);
                if band < BRANCH_SIZE {
                    assert!(d < hi, "distance {} above band [{}, {})", d, lo, hi);
                }
            }
            check_bands(tree, child);
        }
    }

    fn subtree_nodes(tree: &MetricTree, id: BranchId) -> Vec<(&IndexNode, bool)> {
        let branch = tree.branch(id);
        let mut out = vec![(&branch.pivot, branch.tombstone)];
        out.extend(branch.bucket.iter().map(|n| (n, false)));
        for child in branch.children.iter().flatten() {
            out.extend(subtree_nodes(tree, *child));
        }
        out
    }

    #[test]
    fn test_delete_tombstones_pivot_keeps_subtree() {
        let mut tree = MetricTree::new();
        tree.add(run_node("d1", "f1", 10));
        tree.add(run_node("d2", "f2", 22));
        tree.delete("d1");
        // The root pivot is tombstoned but its child is still reachable.
        assert!(tree.branch(0).tombstone);
        assert_eq!(tree.nodes().count(), 2);
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_delete_filters_buckets() {
        let mut tree = MetricTree::new();
        tree.add(run_node("d1", "f1", 10));
        tree.add(run_node("d2", "f2", 9));
        tree.add(run_node("d3", "f3", 11));
        tree.delete("d2");
        assert_eq!(tree.branch(0).bucket.len(), 1);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_delete_whole_document() {
        let mut tree = MetricTree::new();
        tree.add(run_node("d1", "f1", 10));
        tree.add(run_node("d1", "f2", 9));
        tree.add(run_node("d1", "f3", 30));
        tree.delete("d1");
        assert_eq!(tree.len(), 0);
        // Tombstoned pivots remain reachable.
        assert_eq!(tree.nodes().count(), 2);
    }

    #[test]
    fn test_delete_unknown_doc_is_noop() {
        let mut tree = MetricTree::new();
        tree.add(run_node("d1", "f1", 10));
        tree.delete("nope");
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_serde_roundtrip() {
        let mut tree = MetricTree::new();
        for (i, n) in [10, 22, 8, 51].iter().enumerate() {
            tree.add(run_node(&format!("d{}", i), "f", *n));
        }
        tree.delete("d2");
        let bytes = bincode::serialize(&tree).unwrap();
        let back: MetricTree = bincode::deserialize(&bytes).unwrap();
        assert_eq!(tree, back);
    }
}
