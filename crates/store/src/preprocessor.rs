//! LaTeX preprocessor client
//!
//! Queries arrive as raw LaTeX; the external preprocessor normalizes them
//! into the forest wire format. Each call carries its own wall-clock
//! budget, and exceeding it surfaces as a timeout rather than an upstream
//! failure.

use std::time::Duration;
use texsearch_core::{parse_forest, Forest, Result, TexError};

/// HTTP client for the LaTeX preprocessor
pub struct PreprocessorClient {
    url: String,
}

impl PreprocessorClient {
    /// Create a client for the preprocessor at `url`
    pub fn new(url: impl Into<String>) -> Self {
        PreprocessorClient { url: url.into() }
    }

    /// Normalize a LaTeX query into a forest, within `timeout`
    ///
    /// A 4xx from the preprocessor means the query itself was
    /// unparseable and is reported as a bad request.
    pub fn preprocess(&self, latex: &str, timeout: Duration) -> Result<Forest> {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let mut response = agent
            .get(&self.url)
            .query("latex", latex)
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) if (400..500).contains(&code) => {
                    TexError::bad_request(format!("preprocessor rejected query ({})", code))
                }
                e => {
                    let msg = e.to_string();
                    if msg.contains("timed out") || msg.contains("Timeout") {
                        TexError::timeout("preprocessor")
                    } else {
                        TexError::upstream(format!("preprocessor request failed: {}", msg))
                    }
                }
            })?;

        let body = response.body_mut().read_to_string().map_err(|e| {
            TexError::upstream(format!("failed to read preprocessor response: {}", e))
        })?;
        let json: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| TexError::upstream(format!("preprocessor returned invalid JSON: {}", e)))?;
        parse_forest(&json)
            .map_err(|e| TexError::upstream(format!("preprocessor returned malformed forest: {}", e)))
    }
}
