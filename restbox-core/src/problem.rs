//! Structured error bodies (RFC 7807 problem details).

use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::codec::essence;

const PROBLEM_JSON: &str = "application/problem+json";
const PROBLEM_XML: &str = "application/problem+xml";

/// Machine-readable error payload returned by an origin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// URI identifying the problem type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Short human-readable summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Status code set by the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Explanation specific to this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// URI identifying this occurrence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Any additional members.
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Problem {
    /// Parses a problem payload when the response content type announces one.
    ///
    /// Returns `None` for other content types and for bodies that fail to parse.
    pub fn detect(headers: &HeaderMap, body: &[u8]) -> Option<Problem> {
        let content_type = headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let parsed = match essence(content_type).as_str() {
            PROBLEM_JSON => serde_json::from_slice::<Problem>(body).map_err(|e| e.to_string()),
            PROBLEM_XML => std::str::from_utf8(body)
                .map_err(|e| e.to_string())
                .and_then(|text| quick_xml::de::from_str::<Problem>(text).map_err(|e| e.to_string())),
            _ => return None,
        };
        parsed
            .inspect_err(|error| debug!(%error, "ignoring unparsable problem payload"))
            .ok()
    }
}
