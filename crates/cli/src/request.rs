//! Query request envelope
//!
//! One request arrives per line as JSON:
//!
//! ```json
//! {"query": {"searchTerm": "\\dot{V}", "searchTimeout": "2.5",
//!            "startAt": "1", "endAt": "20", "format": "xml"}}
//! ```
//!
//! Numeric fields arrive as decimal strings. Anything that fails to parse
//! is a bad request; nothing here touches the index.

use serde::Deserialize;
use std::time::Duration;
use texsearch_core::{Result, TexError};

/// Default search budget in seconds
pub const DEFAULT_SEARCH_TIMEOUT: f64 = 10.0;

/// Default preprocessor budget in seconds
pub const DEFAULT_PREPROCESSOR_TIMEOUT: f64 = 5.0;

/// Response body format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// XML body under a `text/xml` header
    Xml,
    /// Plain JSON result object
    Json,
}

/// A parsed, validated query request
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Raw LaTeX search term
    pub search_term: String,
    /// Wall-clock budget for the search
    pub search_timeout: Duration,
    /// Wall-clock budget for the preprocessor call
    pub preprocessor_timeout: Duration,
    /// First result to emit, 1-based
    pub start_at: usize,
    /// Last result to emit, inclusive; `None` means unbounded
    pub end_at: Option<usize>,
    /// Response body format
    pub format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    query: RawQuery,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawQuery {
    search_term: String,
    search_timeout: Option<String>,
    preprocessor_timeout: Option<String>,
    start_at: Option<String>,
    end_at: Option<String>,
    format: Option<String>,
}

/// Parse and validate one request line
pub fn parse_request(line: &str) -> Result<QueryRequest> {
    let envelope: Envelope = serde_json::from_str(line)
        .map_err(|e| TexError::bad_request(format!("malformed request: {}", e)))?;
    let raw = envelope.query;

    let search_timeout = seconds("searchTimeout", raw.search_timeout, DEFAULT_SEARCH_TIMEOUT)?;
    let preprocessor_timeout = seconds(
        "preprocessorTimeout",
        raw.preprocessor_timeout,
        DEFAULT_PREPROCESSOR_TIMEOUT,
    )?;

    let start_at = match raw.start_at {
        Some(s) => {
            let n = integer("startAt", &s)?;
            if n < 1 {
                return Err(TexError::bad_request("startAt must be at least 1"));
            }
            n
        }
        None => 1,
    };

    let end_at = raw.end_at.map(|s| integer("endAt", &s)).transpose()?;

    let format = match raw.format.as_deref() {
        None | Some("xml") => ResponseFormat::Xml,
        Some("json") => ResponseFormat::Json,
        Some(other) => {
            return Err(TexError::bad_request(format!(
                "format must be \"xml\" or \"json\", got {:?}",
                other
            )))
        }
    };

    Ok(QueryRequest {
        search_term: raw.search_term,
        search_timeout,
        preprocessor_timeout,
        start_at,
        end_at,
        format,
    })
}

fn seconds(field: &str, value: Option<String>, default: f64) -> Result<Duration> {
    let secs = match value {
        Some(s) => s
            .parse::<f64>()
            .map_err(|_| TexError::bad_request(format!("{} is not a number: {:?}", field, s)))?,
        None => default,
    };
    if !secs.is_finite() || secs <= 0.0 {
        return Err(TexError::bad_request(format!(
            "{} must be a positive number of seconds",
            field
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

fn integer(field: &str, value: &str) -> Result<usize> {
    value
        .parse::<usize>()
        .map_err(|_| TexError::bad_request(format!("{} is not an integer: {:?}", field, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_request_uses_defaults() {
        let req = parse_request(r#"{"query": {"searchTerm": "x"}}"#).unwrap();
        assert_eq!(req.search_term, "x");
        assert_eq!(req.search_timeout, Duration::from_secs_f64(10.0));
        assert_eq!(req.preprocessor_timeout, Duration::from_secs_f64(5.0));
        assert_eq!(req.start_at, 1);
        assert_eq!(req.end_at, None);
        assert_eq!(req.format, ResponseFormat::Xml);
    }

    #[test]
    fn test_full_request() {
        let req = parse_request(
            r#"{"query": {"searchTerm": "\\dot{V}", "searchTimeout": "2.5",
                "preprocessorTimeout": "0.5", "startAt": "3", "endAt": "12",
                "format": "json"}}"#,
        )
        .unwrap();
        assert_eq!(req.search_term, "\\dot{V}");
        assert_eq!(req.search_timeout, Duration::from_secs_f64(2.5));
        assert_eq!(req.preprocessor_timeout, Duration::from_secs_f64(0.5));
        assert_eq!(req.start_at, 3);
        assert_eq!(req.end_at, Some(12));
        assert_eq!(req.format, ResponseFormat::Json);
    }

    #[test]
    fn test_missing_search_term_is_bad_request() {
        let err = parse_request(r#"{"query": {"format": "xml"}}"#).unwrap_err();
        assert!(err.is_bad_request());
    }

    #[test]
    fn test_malformed_json_is_bad_request() {
        let err = parse_request("not json at all").unwrap_err();
        assert!(err.is_bad_request());
    }

    #[test]
    fn test_numbers_must_be_strings_of_decimals() {
        let err =
            parse_request(r#"{"query": {"searchTerm": "x", "startAt": "two"}}"#).unwrap_err();
        assert!(err.is_bad_request());
        let err =
            parse_request(r#"{"query": {"searchTerm": "x", "searchTimeout": "fast"}}"#)
                .unwrap_err();
        assert!(err.is_bad_request());
    }

    #[test]
    fn test_nonpositive_timeout_rejected() {
        let err = parse_request(r#"{"query": {"searchTerm": "x", "searchTimeout": "0"}}"#)
            .unwrap_err();
        assert!(err.is_bad_request());
        let err = parse_request(r#"{"query": {"searchTerm": "x", "searchTimeout": "-1"}}"#)
            .unwrap_err();
        assert!(err.is_bad_request());
    }

    #[test]
    fn test_start_at_zero_rejected() {
        let err =
            parse_request(r#"{"query": {"searchTerm": "x", "startAt": "0"}}"#).unwrap_err();
        assert!(err.is_bad_request());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let err =
            parse_request(r#"{"query": {"searchTerm": "x", "format": "yaml"}}"#).unwrap_err();
        assert!(err.is_bad_request());
    }

    #[test]
    fn test_tiny_timeout_is_accepted() {
        let req = parse_request(
            r#"{"query": {"searchTerm": "x", "searchTimeout": "0.001"}}"#,
        )
        .unwrap();
        assert_eq!(req.search_timeout, Duration::from_secs_f64(0.001));
    }
}
