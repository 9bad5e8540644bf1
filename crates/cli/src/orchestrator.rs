//! Query orchestration
//!
//! One query runs to completion between I/O: preprocess the term under
//! its own budget, page the search under the wall-clock deadline, slice
//! the ranked output to the requested window, then resolve each surviving
//! fragment's source through the document store (one fetch per distinct
//! document, cached for the request) and group the window by document in
//! first-hit order.

use crate::request::QueryRequest;
use std::collections::HashMap;
use std::time::Instant;
use texsearch_core::{Result, TermSeq};
use texsearch_search::{Match, MetricTree, Page, Search};
use texsearch_store::{DocPayload, DocStoreClient, PreprocessorClient};
use tracing::{debug, warn};

/// Results requested from the search per page
const PAGE_SIZE: usize = 50;

/// Everything a query needs: the loaded tree and the two collaborators
pub struct QueryContext<'a> {
    /// The in-memory index snapshot
    pub tree: &'a MetricTree,
    /// Document store, used to resolve fragment sources
    pub store: &'a DocStoreClient,
    /// LaTeX preprocessor
    pub preprocessor: &'a PreprocessorClient,
}

/// One matched equation within a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equation {
    /// Index distance from the query
    pub distance: usize,
    /// Raw LaTeX source, verbatim
    pub source: String,
}

/// All matched equations of one document, in rank order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocResult {
    /// External document id
    pub doc_id: String,
    /// Matched equations
    pub equations: Vec<Equation>,
}

/// The materialized answer to one query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOutcome {
    /// The search term, echoed back
    pub query: String,
    /// Matches grouped by document, in rank order
    pub results: Vec<DocResult>,
}

/// Resolves a fragment id to its raw source
///
/// The document store implements this; tests substitute a map.
pub trait FragmentResolver {
    /// Return the fragment's source, or `None` if the store has moved on
    fn resolve(&mut self, doc_id: &str, fragment_id: &str) -> Result<Option<String>>;
}

/// Resolver backed by the document store, caching one fetch per document
pub struct StoreResolver<'a> {
    store: &'a DocStoreClient,
    cache: HashMap<String, Option<DocPayload>>,
}

impl<'a> StoreResolver<'a> {
    /// Create a resolver over the store
    pub fn new(store: &'a DocStoreClient) -> Self {
        StoreResolver {
            store,
            cache: HashMap::new(),
        }
    }
}

impl FragmentResolver for StoreResolver<'_> {
    fn resolve(&mut self, doc_id: &str, fragment_id: &str) -> Result<Option<String>> {
        if !self.cache.contains_key(doc_id) {
            let payload = self.store.fetch_document(doc_id)?;
            self.cache.insert(doc_id.to_string(), payload);
        }
        Ok(self
            .cache
            .get(doc_id)
            .and_then(|p| p.as_ref())
            .and_then(|p| p.fragments.get(fragment_id))
            .map(|f| f.source.clone()))
    }
}

/// Run one query end to end
pub fn run_query(ctx: &QueryContext<'_>, request: &QueryRequest) -> Result<QueryOutcome> {
    let forest = ctx
        .preprocessor
        .preprocess(&request.search_term, request.preprocessor_timeout)?;
    let target = TermSeq::from_forest(&forest);
    let mut resolver = StoreResolver::new(ctx.store);
    execute_query(ctx.tree, target, request, &mut resolver)
}

/// Search, paginate and materialize, with source resolution abstracted
pub fn execute_query(
    tree: &MetricTree,
    target: TermSeq,
    request: &QueryRequest,
    resolver: &mut dyn FragmentResolver,
) -> Result<QueryOutcome> {
    let deadline = Instant::now() + request.search_timeout;
    let mut search = Search::new(tree, target, Some(deadline));
    debug!(cutoff = search.cutoff(), "search started");

    let mut matches: Vec<Match> = Vec::new();
    loop {
        if let Some(end) = request.end_at {
            if matches.len() >= end {
                break;
            }
        }
        match search.next_page(PAGE_SIZE)? {
            Page::More(ms) => matches.extend(ms),
            Page::Last(ms) => {
                matches.extend(ms);
                break;
            }
        }
    }

    let window = paginate(&matches, request.start_at, request.end_at);
    let results = group_by_doc(window, resolver)?;
    Ok(QueryOutcome {
        query: request.search_term.clone(),
        results,
    })
}

/// Slice the ranked output to the `[start_at, end_at]` window (1-based,
/// inclusive, unbounded when `end_at` is absent)
fn paginate(matches: &[Match], start_at: usize, end_at: Option<usize>) -> &[Match] {
    let start = (start_at - 1).min(matches.len());
    let end = end_at.unwrap_or(matches.len()).min(matches.len());
    if start >= end {
        return &[];
    }
    &matches[start..end]
}

fn group_by_doc(
    window: &[Match],
    resolver: &mut dyn FragmentResolver,
) -> Result<Vec<DocResult>> {
    let mut results: Vec<DocResult> = Vec::new();
    let mut by_doc: HashMap<String, usize> = HashMap::new();
    for m in window {
        let Some(source) = resolver.resolve(&m.doc_id, &m.fragment_id)? else {
            // The store has moved past the loaded snapshot.
            warn!(
                doc_id = %m.doc_id,
                fragment_id = %m.fragment_id,
                "fragment vanished from store, dropping from results"
            );
            continue;
        };
        let equation = Equation {
            distance: m.distance,
            source,
        };
        match by_doc.get(&m.doc_id) {
            Some(&slot) => results[slot].equations.push(equation),
            None => {
                by_doc.insert(m.doc_id.clone(), results.len());
                results.push(DocResult {
                    doc_id: m.doc_id.clone(),
                    equations: vec![equation],
                });
            }
        }
    }
    Ok(results)
}
