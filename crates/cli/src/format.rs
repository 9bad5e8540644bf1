//! Response envelopes
//!
//! Every request line gets exactly one JSON envelope line back:
//!
//! - success, xml: `{"code": 200, "headers": {"Content-type": "text/xml"}, "body": <xml>}`
//! - success, json: `{"code": 200, "json": {"query": …, "results": […]}}`
//! - bad request: `{"code": 400}`
//! - timeout: `{"code": 500, "headers": {"Content-type": "text/plain"}, "body": "Error: Timed out"}`
//! - anything else: `{"code": 500}`
//!
//! The XML body nests equations under one `<result>` element per
//! document:
//! `<results><query>…</query><result doi="…"><equation distance="n">…</equation>…</result>…</results>`

use crate::orchestrator::QueryOutcome;
use crate::request::ResponseFormat;
use serde_json::{json, Value};
use texsearch_core::TexError;

/// Render a success envelope
pub fn success_response(outcome: &QueryOutcome, format: ResponseFormat) -> Value {
    match format {
        ResponseFormat::Xml => json!({
            "code": 200,
            "headers": {"Content-type": "text/xml"},
            "body": xml_body(outcome),
        }),
        ResponseFormat::Json => json!({
            "code": 200,
            "json": {
                "query": outcome.query,
                "results": outcome.results.iter().map(|r| json!({
                    "doi": r.doc_id,
                    "equations": r.equations.iter().map(|e| json!({
                        "distance": e.distance,
                        "source": e.source,
                    })).collect::<Vec<_>>(),
                })).collect::<Vec<_>>(),
            },
        }),
    }
}

/// Render an error envelope
pub fn error_response(error: &TexError) -> Value {
    if error.is_bad_request() {
        json!({"code": 400})
    } else if error.is_timeout() {
        json!({
            "code": 500,
            "headers": {"Content-type": "text/plain"},
            "body": "Error: Timed out",
        })
    } else {
        json!({"code": 500})
    }
}

fn xml_body(outcome: &QueryOutcome) -> String {
    let mut xml = String::from("<results>");
    xml.push_str("<query>");
    xml.push_str(&xml_escape(&outcome.query));
    xml.push_str("</query>");
    for result in &outcome.results {
        xml.push_str("<result doi=\"");
        xml.push_str(&xml_escape(&result.doc_id));
        xml.push_str("\">");
        for equation in &result.equations {
            xml.push_str(&format!("<equation distance=\"{}\">", equation.distance));
            xml.push_str(&xml_escape(&equation.source));
            xml.push_str("</equation>");
        }
        xml.push_str("</result>");
    }
    xml.push_str("</results>");
    xml
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
