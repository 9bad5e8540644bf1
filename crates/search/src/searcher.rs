//! Resumable ranked nearest-neighbor search
//!
//! A search walks the metric tree with a priority-queue frontier of
//! subtrees, keyed by each band's lower-bound distance. Results are
//! classified in two stages: `sorting` holds candidates under the cutoff
//! whose distance might still be beaten by an unexplored subtree,
//! `sorted` holds candidates confirmed to precede everything still to
//! come. `min_dist`, the largest lower bound popped so far, is the
//! promotion threshold: a candidate below it can never be outranked by a
//! future discovery, so promoting on every pop preserves output order
//! without resorting.
//!
//! The caller consumes pages with [`Search::next_page`]; the deadline is
//! checked at least once per frontier pop, and expiry surfaces as a
//! timeout error without having mutated anything.

use crate::distance::index_distance;
use crate::queue::SearchQueue;
use crate::tree::{BranchId, IndexNode, MetricTree, BRANCH_SIZE, BUCKET_SIZE};
use std::time::Instant;
use texsearch_core::{Result, TermSeq, TexError};

/// One ranked result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Document containing the fragment
    pub doc_id: String,
    /// Fragment id within the document
    pub fragment_id: String,
    /// Index distance from the query
    pub distance: usize,
}

/// One page of results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    /// A full page; more may follow
    More(Vec<Match>),
    /// The final results; the search is exhausted
    Last(Vec<Match>),
}

impl Page {
    /// The matches in this page
    pub fn matches(&self) -> &[Match] {
        match self {
            Page::More(ms) | Page::Last(ms) => ms,
        }
    }

    /// Whether this was the final page
    pub fn is_last(&self) -> bool {
        matches!(self, Page::Last(_))
    }
}

#[derive(Debug, Clone)]
struct Hit {
    doc_id: String,
    fragment_id: String,
}

/// Resumable search state over a [`MetricTree`]
pub struct Search<'t> {
    tree: &'t MetricTree,
    target: TermSeq,
    cutoff: usize,
    min_dist: usize,
    unsearched: SearchQueue<BranchId>,
    sorting: SearchQueue<Hit>,
    sorted: SearchQueue<Hit>,
    deadline: Option<Instant>,
}

impl<'t> Search<'t> {
    /// Start a search for `target` over `tree`
    ///
    /// The cutoff is fixed at creation:
    /// `suffix_count(target) / 3 + 1`, roughly a third of the query
    /// length. An optional wall-clock deadline bounds the whole search.
    pub fn new(tree: &'t MetricTree, target: TermSeq, deadline: Option<Instant>) -> Self {
        let cutoff = target.suffix_count() / 3 + 1;
        let mut unsearched = SearchQueue::new();
        if let Some(root) = tree.root() {
            unsearched.push(root, 0);
        }
        Search {
            tree,
            target,
            cutoff,
            min_dist: 0,
            unsearched,
            sorting: SearchQueue::new(),
            sorted: SearchQueue::new(),
            deadline,
        }
    }

    /// The maximum distance a result may have
    pub fn cutoff(&self) -> usize {
        self.cutoff
    }

    /// Produce the next `k` results
    ///
    /// Returns [`Page::More`] with exactly `k` results while the tree may
    /// hold more, and [`Page::Last`] with the remainder once it is
    /// exhausted. Distances across successive pages are non-decreasing.
    pub fn next_page(&mut self, k: usize) -> Result<Page> {
        loop {
            if let Some(entries) = self.sorted.split_at_length(k) {
                return Ok(Page::More(to_matches(entries)));
            }
            self.check_deadline()?;
            match self.next_search_node() {
                Some(id) => self.visit(id),
                None => {
                    if self.sorting.is_empty() {
                        let rest = std::mem::take(&mut self.sorted);
                        return Ok(Page::Last(to_matches(rest.into_sorted_vec())));
                    }
                    // The frontier is spent: everything tentative is final.
                    let rest = std::mem::take(&mut self.sorting);
                    self.sorted.append(rest);
                }
            }
        }
    }

    /// Pop the next subtree off the frontier, advancing `min_dist` and
    /// promoting newly confirmed results
    fn next_search_node(&mut self) -> Option<BranchId> {
        if self.min_dist > self.cutoff {
            return None;
        }
        let (id, bound) = self.unsearched.pop()?;
        self.min_dist = self.min_dist.max(bound);
        for (hit, d) in self.sorting.split_at_priority(self.min_dist) {
            self.sorted.push(hit, d);
        }
        Some(id)
    }

    fn visit(&mut self, id: BranchId) {
        let branch = self.tree.branch(id);
        let pivot_dist = index_distance(&self.target, &branch.pivot.terms);
        for band in 0..BRANCH_SIZE {
            if let Some(child) = branch.children[band] {
                self.unsearched
                    .push(child, pivot_dist.saturating_sub(band * BUCKET_SIZE));
            }
        }
        // No finite lower bound for the overflow band.
        if let Some(child) = branch.children[BRANCH_SIZE] {
            self.unsearched.push(child, 0);
        }
        if !branch.tombstone {
            self.insert_result(&branch.pivot, pivot_dist);
        }
        for entry in &branch.bucket {
            let d = index_distance(&self.target, &entry.terms);
            self.insert_result(entry, d);
        }
    }

    fn insert_result(&mut self, node: &IndexNode, distance: usize) {
        if distance > self.cutoff {
            return;
        }
        let hit = Hit {
            doc_id: node.doc_id.clone(),
            fragment_id: node.fragment_id.clone(),
        };
        if distance < self.min_dist {
            self.sorted.push(hit, distance);
        } else {
            self.sorting.push(hit, distance);
        }
    }

    fn check_deadline(&self) -> Result<()> {
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(TexError::timeout("search")),
            _ => Ok(()),
        }
    }
}

fn to_matches(entries: Vec<(Hit, usize)>) -> Vec<Match> {
    entries
        .into_iter()
        .map(|(hit, distance)| Match {
            doc_id: hit.doc_id,
            fragment_id: hit.fragment_id,
            distance,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::IndexNode;
    use std::time::Duration;
    use texsearch_core::{Forest, Token};

    fn text(s: &str) -> Token {
        Token::Text(s.to_string())
    }

    fn run_forest(n: usize) -> Forest {
        Forest::new((0..n).map(|_| text("a")).collect())
    }

    fn run_tree(sizes: &[usize]) -> MetricTree {
        let mut tree = MetricTree::new();
        for (i, n) in sizes.iter().enumerate() {
            tree.add(IndexNode::new(
                format!("doc{}", i),
                format!("frag{}", i),
                &run_forest(*n),
            ));
        }
        tree
    }

    fn collect_all(search: &mut Search<'_>, k: usize) -> Vec<Match> {
        let mut out = Vec::new();
        loop {
            match search.next_page(k).unwrap() {
                Page::More(ms) => out.extend(ms),
                Page::Last(ms) => {
                    out.extend(ms);
                    return out;
                }
            }
        }
    }

    #[test]
    fn test_empty_tree_yields_empty_last_page() {
        let tree = MetricTree::new();
        let target = TermSeq::from_forest(&Forest::new(vec![text("x")]));
        let mut search = Search::new(&tree, target, None);
        let page = search.next_page(8).unwrap();
        assert!(page.is_last());
        assert!(page.matches().is_empty());
    }

    #[test]
    fn test_exact_match_at_distance_zero() {
        let mut tree = MetricTree::new();
        tree.add(IndexNode::new(
            "doc0",
            "frag0",
            &Forest::new(vec![text("x")]),
        ));
        let target = TermSeq::from_forest(&Forest::new(vec![text("x")]));
        let mut search = Search::new(&tree, target, None);
        assert_eq!(search.cutoff(), 1);
        let all = collect_all(&mut search, 8);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].fragment_id, "frag0");
        assert_eq!(all[0].distance, 0);
    }

    #[test]
    fn test_rename_at_cutoff_is_included() {
        let mut tree = MetricTree::new();
        tree.add(IndexNode::new(
            "doc0",
            "frag0",
            &Forest::new(vec![Token::Command {
                name: "dot".to_string(),
                children: Forest::new(vec![text("V")]),
            }]),
        ));
        let target = TermSeq::from_forest(&Forest::new(vec![Token::Command {
            name: "dot".to_string(),
            children: Forest::new(vec![text("W")]),
        }]));
        let mut search = Search::new(&tree, target, None);
        assert_eq!(search.cutoff(), 1);
        let all = collect_all(&mut search, 8);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].distance, 1);
    }

    #[test]
    fn test_beyond_cutoff_is_dropped() {
        let mut tree = MetricTree::new();
        tree.add(IndexNode::new("doc0", "frag0", &run_forest(1)));
        // Query of 12 tokens, cutoff 5; a 1-run target is at distance 11.
        let target = TermSeq::from_forest(&run_forest(12));
        let mut search = Search::new(&tree, target, None);
        assert_eq!(search.cutoff(), 5);
        let all = collect_all(&mut search, 8);
        assert!(all.is_empty());
    }

    #[test]
    fn test_completeness_and_order_on_band_aligned_corpus() {
        // Runs of one symbol give distance max(0, len(q) - len(t)); with
        // every length a multiple of the band width the band bounds are
        // exact, so the search must find precisely the brute-force result
        // set, in non-decreasing distance order.
        let sizes: Vec<usize> = (0..40).map(|i| 5 * (i % 18 + 1)).collect();
        let tree = run_tree(&sizes);
        let target = TermSeq::from_forest(&run_forest(30));
        let mut search = Search::new(&tree, target.clone(), None);
        let cutoff = search.cutoff();
        let all = collect_all(&mut search, 4);

        let mut expected: Vec<(String, usize)> = tree
            .nodes()
            .filter(|(_, tombstoned)| !tombstoned)
            .map(|(n, _)| (n.fragment_id.clone(), index_distance(&target, &n.terms)))
            .filter(|(_, d)| *d <= cutoff)
            .collect();

        // Exactly once each.
        let mut seen: Vec<&str> = all.iter().map(|m| m.fragment_id.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), all.len());

        // Same result set with the same distances.
        let mut got: Vec<(String, usize)> = all
            .iter()
            .map(|m| (m.fragment_id.clone(), m.distance))
            .collect();
        got.sort();
        expected.sort();
        assert_eq!(got, expected);

        // Monotone yield.
        for pair in all.windows(2) {
            assert!(pair[0].distance <= pair[1].distance);
        }
    }

    #[test]
    fn test_soundness_on_unaligned_corpus() {
        // With arbitrary lengths the band bounds over-tighten by up to
        // BUCKET_SIZE - 1, so results hugging the cutoff are best-effort.
        // Everything returned must still be correct, and everything
        // comfortably inside the cutoff must still be found.
        let sizes: Vec<usize> = (0..60).map(|i| (i * 7) % 90 + 1).collect();
        let tree = run_tree(&sizes);
        let target = TermSeq::from_forest(&run_forest(30));
        let mut search = Search::new(&tree, target.clone(), None);
        let cutoff = search.cutoff();
        let all = collect_all(&mut search, 8);

        let mut seen: Vec<&str> = all.iter().map(|m| m.fragment_id.as_str()).collect();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), all.len());

        for m in &all {
            assert!(m.distance <= cutoff);
            let (node, tombstoned) = tree
                .nodes()
                .find(|(n, _)| n.fragment_id == m.fragment_id)
                .unwrap();
            assert!(!tombstoned);
            assert_eq!(m.distance, index_distance(&target, &node.terms));
        }

        let found: std::collections::HashSet<&str> =
            all.iter().map(|m| m.fragment_id.as_str()).collect();
        for (node, tombstoned) in tree.nodes() {
            if tombstoned {
                continue;
            }
            let d = index_distance(&target, &node.terms);
            if d + BUCKET_SIZE <= cutoff + 1 {
                assert!(
                    found.contains(node.fragment_id.as_str()),
                    "missed {} at distance {} (cutoff {})",
                    node.fragment_id,
                    d,
                    cutoff
                );
            }
        }
    }

    #[test]
    fn test_deleted_fragments_absent_but_search_terminates() {
        let sizes: Vec<usize> = (0..40).map(|i| i * 3 % 50 + 1).collect();
        let mut tree = run_tree(&sizes);
        for i in 0..20 {
            tree.delete(&format!("doc{}", i));
        }
        let target = TermSeq::from_forest(&run_forest(20));
        let mut search = Search::new(&tree, target, None);
        let all = collect_all(&mut search, 8);
        for m in &all {
            let idx: usize = m.doc_id.trim_start_matches("doc").parse().unwrap();
            assert!(idx >= 20, "deleted fragment {} surfaced", m.doc_id);
        }
    }

    #[test]
    fn test_paging_returns_exact_pages() {
        let sizes: Vec<usize> = (18..30).collect();
        let tree = run_tree(&sizes);
        let target = TermSeq::from_forest(&run_forest(20));
        let mut search = Search::new(&tree, target, None);
        let first = search.next_page(3).unwrap();
        assert!(!first.is_last());
        assert_eq!(first.matches().len(), 3);
    }

    #[test]
    fn test_page_size_indifference() {
        let sizes: Vec<usize> = (0..50).map(|i| (i * 11) % 70 + 1).collect();
        let tree = run_tree(&sizes);
        let target = TermSeq::from_forest(&run_forest(25));

        let mut one = Search::new(&tree, target.clone(), None);
        let all_at_once = collect_all(&mut one, 1000);
        let mut small = Search::new(&tree, target, None);
        let paged = collect_all(&mut small, 2);

        let flat = |ms: &[Match]| {
            ms.iter()
                .map(|m| (m.fragment_id.clone(), m.distance))
                .collect::<Vec<_>>()
        };
        let mut a = flat(&all_at_once);
        let mut b = flat(&paged);
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_expired_deadline_times_out() {
        let sizes: Vec<usize> = (0..30).collect();
        let tree = run_tree(&sizes);
        let target = TermSeq::from_forest(&run_forest(10));
        let deadline = Instant::now() - Duration::from_millis(1);
        let mut search = Search::new(&tree, target, Some(deadline));
        let err = search.next_page(8).unwrap_err();
        assert!(err.is_timeout());
    }
}
