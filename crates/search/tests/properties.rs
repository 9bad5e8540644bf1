//! Randomized property tests for the distance kernel and the index
//!
//! Forests are generated from a small command/symbol alphabet with bounded
//! depth, the shapes the preprocessor actually produces. Seeds are fixed so
//! failures reproduce.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use texsearch_core::{Forest, TermSeq, Token};
use texsearch_search::{
    edit_distance, index_distance, left_edit_distance, IndexNode, MetricTree, Search,
};

const SYMBOLS: &[&str] = &["x", "y", "z", "alpha", "beta"];
const COMMANDS: &[&str] = &["frac", "sqrt", "dot", "sum", "mathbf"];

fn random_token(rng: &mut StdRng, depth: usize) -> Token {
    if depth == 0 || rng.gen_bool(0.7) {
        Token::Text(SYMBOLS[rng.gen_range(0..SYMBOLS.len())].to_string())
    } else {
        let arity = rng.gen_range(1..=2);
        Token::Command {
            name: COMMANDS[rng.gen_range(0..COMMANDS.len())].to_string(),
            children: Forest::new(
                (0..arity).map(|_| random_token(rng, depth - 1)).collect(),
            ),
        }
    }
}

fn random_forest(rng: &mut StdRng, max_len: usize) -> Forest {
    let len = rng.gen_range(0..=max_len);
    Forest::new((0..len).map(|_| random_token(rng, 2)).collect())
}

#[test]
fn distance_is_zero_on_self_and_nonnegative() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..200 {
        let f = TermSeq::from_forest(&random_forest(&mut rng, 6));
        let g = TermSeq::from_forest(&random_forest(&mut rng, 6));
        assert_eq!(edit_distance(&f, &f), 0);
        // usize already guarantees non-negativity; the interesting part is
        // that unequal forests are never reported at zero.
        if f != g {
            let d = edit_distance(&f, &g);
            assert!(d > 0 || f.terms() == g.terms());
        }
    }
}

#[test]
fn distance_is_symmetric() {
    let mut rng = StdRng::seed_from_u64(12);
    for _ in 0..200 {
        let f = TermSeq::from_forest(&random_forest(&mut rng, 6));
        let g = TermSeq::from_forest(&random_forest(&mut rng, 6));
        assert_eq!(edit_distance(&f, &g), edit_distance(&g, &f));
    }
}

#[test]
fn distance_is_bounded_by_total_cost() {
    let mut rng = StdRng::seed_from_u64(13);
    for _ in 0..200 {
        let f = TermSeq::from_forest(&random_forest(&mut rng, 6));
        let g = TermSeq::from_forest(&random_forest(&mut rng, 6));
        assert!(edit_distance(&f, &g) <= f.cost() + g.cost());
    }
}

#[test]
fn left_distance_is_bounded_by_query_cost() {
    let mut rng = StdRng::seed_from_u64(14);
    for _ in 0..200 {
        let f = TermSeq::from_forest(&random_forest(&mut rng, 5));
        let g = TermSeq::from_forest(&random_forest(&mut rng, 8));
        assert!(left_edit_distance(&f, &g) <= f.cost());
        assert!(index_distance(&f, &g) <= f.cost());
    }
}

#[test]
fn index_distance_never_exceeds_any_suffix_distance() {
    let mut rng = StdRng::seed_from_u64(15);
    for _ in 0..100 {
        let q = TermSeq::from_forest(&random_forest(&mut rng, 4));
        let target = random_forest(&mut rng, 6);
        let whole = TermSeq::from_forest(&target);
        let best = index_distance(&q, &whole);
        for suffix in target.suffixes() {
            let via_suffix = left_edit_distance(&q, &TermSeq::from_forest(&suffix));
            assert!(best <= via_suffix);
        }
    }
}

#[test]
fn suffix_enumeration_shape() {
    let mut rng = StdRng::seed_from_u64(16);
    for _ in 0..100 {
        let f = random_forest(&mut rng, 8);
        let suffixes = f.suffixes();
        assert_eq!(suffixes.len(), f.top_level_len() + 1);
        for (i, suffix) in suffixes.iter().enumerate() {
            assert_eq!(suffix.tokens(), &f.tokens()[i..]);
        }
        assert_eq!(
            TermSeq::from_forest(&f).suffix_count(),
            f.top_level_len() + 1
        );
    }
}

#[test]
fn search_results_are_sound_on_random_corpus() {
    let mut rng = StdRng::seed_from_u64(17);
    let mut tree = MetricTree::new();
    let mut corpus = Vec::new();
    for i in 0..150 {
        let forest = random_forest(&mut rng, 8);
        let node = IndexNode::new(format!("doc{}", i / 3), format!("frag{}", i), &forest);
        corpus.push(node.clone());
        tree.add(node);
    }
    for round in 0..20 {
        let target = TermSeq::from_forest(&random_forest(&mut rng, 4));
        let mut search = Search::new(&tree, target.clone(), None);
        let cutoff = search.cutoff();
        let mut results = Vec::new();
        loop {
            match search.next_page(16).unwrap() {
                texsearch_search::Page::More(ms) => results.extend(ms),
                texsearch_search::Page::Last(ms) => {
                    results.extend(ms);
                    break;
                }
            }
        }
        let mut ids: Vec<&str> = results.iter().map(|m| m.fragment_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), results.len(), "duplicate result in round {}", round);
        for m in &results {
            assert!(m.distance <= cutoff);
            let node = corpus
                .iter()
                .find(|n| n.fragment_id == m.fragment_id)
                .unwrap();
            assert_eq!(m.distance, index_distance(&target, &node.terms));
        }
    }
}

#[test]
fn search_skips_tombstoned_documents() {
    let mut rng = StdRng::seed_from_u64(18);
    let mut tree = MetricTree::new();
    for i in 0..1000 {
        let forest = random_forest(&mut rng, 6);
        tree.add(IndexNode::new(
            format!("doc{}", i),
            format!("frag{}", i),
            &forest,
        ));
    }
    for i in 0..500 {
        tree.delete(&format!("doc{}", i));
    }
    for _ in 0..10 {
        let target = TermSeq::from_forest(&random_forest(&mut rng, 4));
        let mut search = Search::new(&tree, target, None);
        loop {
            match search.next_page(32).unwrap() {
                texsearch_search::Page::More(ms) | texsearch_search::Page::Last(ms)
                    if ms.iter().any(|m| {
                        m.doc_id
                            .trim_start_matches("doc")
                            .parse::<usize>()
                            .map(|i| i < 500)
                            .unwrap_or(false)
                    }) =>
                {
                    panic!("tombstoned fragment surfaced");
                }
                texsearch_search::Page::More(_) => {}
                texsearch_search::Page::Last(_) => break,
            }
        }
    }
}
