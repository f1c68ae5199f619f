//! Gateway access-log records.
//!
//! The exporter receives one JSON document per proxied request from the
//! gateway's HTTP log plugin (Kong `http-log` layout). Only the fields used
//! for route attribution and labelling are modelled; everything else in the
//! record is ignored.
//!
//! ```json
//! {
//!   "request":   { "method": "GET", "uri": "/api/v1/users/1?x=y",
//!                  "headers": { "x-consumer-username": "acme" } },
//!   "response":  { "status": 200 },
//!   "latencies": { "request": 12 }
//! }
//! ```

use serde::Deserialize;
use std::collections::HashMap;

/// A header value as logged: a single string, or every occurrence of a
/// repeated header
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    One(String),
    Many(Vec<String>),
}

impl HeaderValue {
    /// Value as a single string; repeated occurrences are joined with `,`
    #[must_use]
    pub fn joined(&self) -> String {
        match self {
            HeaderValue::One(v) => v.clone(),
            HeaderValue::Many(vs) => vs.join(","),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedRequest {
    pub method: String,
    /// Request target as received by the gateway, query string included
    pub uri: String,
    #[serde(default)]
    pub headers: HashMap<String, HeaderValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedResponse {
    pub status: u16,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Latencies {
    /// Total time spent on the request, in milliseconds
    #[serde(default)]
    pub request: i64,
}

/// One access-log record
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayLog {
    pub request: LoggedRequest,
    pub response: LoggedResponse,
    #[serde(default)]
    pub latencies: Latencies,
}

impl GatewayLog {
    /// Header value by case-insensitive name; empty when the header is absent
    #[must_use]
    pub fn header(&self, name: &str) -> String {
        self.request
            .headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.joined())
            .unwrap_or_default()
    }

    /// Request latency in milliseconds; negative values clamp to zero
    #[must_use]
    pub fn latency_ms(&self) -> u64 {
        self.latencies.request.max(0) as u64
    }

    /// Request latency in seconds; negative values clamp to zero
    #[must_use]
    pub fn latency_seconds(&self) -> f64 {
        self.latency_ms() as f64 / 1000.0
    }
}

/// Parse one JSON access-log record
pub fn parse_log(body: &[u8]) -> Result<GatewayLog, serde_json::Error> {
    serde_json::from_slice(body)
}
