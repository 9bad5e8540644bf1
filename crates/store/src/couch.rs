//! Document store client
//!
//! The corpus lives in a CouchDB-style document store reached over HTTP.
//! Two endpoints matter here: the sequential update feed
//! (`_all_docs_by_seq`) that drives the reconciler, and plain document
//! fetches used to resolve fragment sources at query time.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use texsearch_core::{Result, TexError};

/// One row of the sequential update feed
#[derive(Debug, Clone, PartialEq)]
pub struct DocUpdate {
    /// Document the update concerns
    pub doc_id: String,
    /// Change sequence number, strictly increasing across the feed
    pub seq: u64,
    /// Whether the document was deleted
    pub deleted: bool,
    /// Document body, absent for deletions
    pub payload: Option<DocPayload>,
}

/// A document body as stored: fragments keyed by fragment id
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DocPayload {
    /// Fragments keyed by their opaque ids
    #[serde(default)]
    pub fragments: BTreeMap<String, FragmentPayload>,
}

/// One stored fragment: raw source plus the preprocessed forest JSON
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FragmentPayload {
    /// Raw LaTeX source, echoed verbatim in responses
    pub source: String,
    /// Forest in wire format; parsed when the index node is built
    pub tokens: Value,
}

#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    rows: Vec<FeedRow>,
}

#[derive(Debug, Deserialize)]
struct FeedRow {
    id: String,
    key: u64,
    #[serde(default)]
    value: FeedValue,
    doc: Option<DocPayload>,
}

#[derive(Debug, Default, Deserialize)]
struct FeedValue {
    #[serde(default)]
    deleted: bool,
}

/// HTTP client for the document store
pub struct DocStoreClient {
    base_url: String,
    timeout: Duration,
}

impl DocStoreClient {
    /// Create a client for the store rooted at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        DocStoreClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    fn agent(&self) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(self.timeout))
            .build();
        ureq::Agent::new_with_config(config)
    }

    fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<Option<Value>> {
        let agent = self.agent();
        let mut request = agent.get(url);
        for (key, value) in query {
            request = request.query(key, value);
        }
        let mut response = match request.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => return Ok(None),
            Err(e) => {
                return Err(TexError::upstream(format!(
                    "document store request failed: {}",
                    e
                )))
            }
        };
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TexError::upstream(format!("failed to read store response: {}", e)))?;
        let json = serde_json::from_str(&body)
            .map_err(|e| TexError::upstream(format!("store returned invalid JSON: {}", e)))?;
        Ok(Some(json))
    }

    /// Fetch up to `limit` updates with sequence strictly after `since`
    ///
    /// The store's `startkey` is inclusive, so the query starts one past
    /// the watermark. Rows come back ordered by sequence.
    pub fn fetch_updates(&self, since: u64, limit: usize) -> Result<Vec<DocUpdate>> {
        let url = format!("{}/_all_docs_by_seq", self.base_url);
        let json = self
            .get_json(&url, &feed_query(since, limit))?
            .ok_or_else(|| TexError::upstream("update feed not found"))?;
        let envelope: FeedEnvelope = serde_json::from_value(json)
            .map_err(|e| TexError::upstream(format!("malformed update feed: {}", e)))?;
        Ok(envelope
            .rows
            .into_iter()
            .map(|row| DocUpdate {
                doc_id: row.id,
                seq: row.key,
                deleted: row.value.deleted,
                payload: row.doc,
            })
            .collect())
    }

    /// Fetch one document body, `None` if the store no longer has it
    pub fn fetch_document(&self, doc_id: &str) -> Result<Option<DocPayload>> {
        let url = format!("{}/{}", self.base_url, doc_id);
        let Some(json) = self.get_json(&url, &[])? else {
            return Ok(None);
        };
        let payload = serde_json::from_value(json)
            .map_err(|e| TexError::upstream(format!("malformed document {}: {}", doc_id, e)))?;
        Ok(Some(payload))
    }
}

/// Query parameters for the update feed
///
/// `startkey` is one past `since` because the store treats it as
/// inclusive; the returned rows are therefore strictly after the
/// watermark, the half-open interval the reconciler expects.
fn feed_query(since: u64, limit: usize) -> [(&'static str, String); 3] {
    [
        ("startkey", since.saturating_add(1).to_string()),
        ("limit", limit.to_string()),
        ("include_docs", "true".to_string()),
    ]
}
