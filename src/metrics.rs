//! Per-endpoint request metrics in Prometheus text format.
//!
//! Every resolved access-log record lands in one series keyed by
//! `method`, `status`, `path` (the declared route template, never the raw
//! URI) and one label per configured request header. Each series carries a
//! request counter and a latency histogram. The exporter also counts its own
//! ingestion and reload activity.
//!
//! Recording is lock-free apart from the `DashMap` shard lookup; rendering
//! sorts series so scrapes are stable.

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::access_log::GatewayLog;
use crate::hot_reload::ReloadHook;
use crate::router::{RouteMatch, Specification};
use crate::spec::{SpecError, SpecMeta};

/// Upper bounds, in seconds, of the latency histogram buckets
pub const DURATION_BUCKETS: [f64; 11] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

const REQUESTS_TOTAL: &str = "http_requests_api_total";
const REQUEST_DURATION: &str = "http_request_duration_api_seconds";

/// Label name for a request header: lower-cased, `-` replaced by `_`
#[must_use]
pub fn header_label_name(header: &str) -> String {
    header.to_ascii_lowercase().replace('-', "_")
}

#[derive(Default)]
struct Series {
    count: AtomicU64,
    /// Observations per bucket, not cumulative; `+Inf` is `count`
    buckets: [AtomicU64; DURATION_BUCKETS.len()],
    sum_ms: AtomicU64,
}

impl Series {
    fn observe(&self, log: &GatewayLog) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(log.latency_ms(), Ordering::Relaxed);
        let seconds = log.latency_seconds();
        if let Some(i) = DURATION_BUCKETS.iter().position(|le| seconds <= *le) {
            self.buckets[i].fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of one series for rendering
struct SeriesSnapshot {
    labels: Vec<String>,
    count: u64,
    buckets: [u64; DURATION_BUCKETS.len()],
    sum_ms: u64,
}

/// Registry for API request series and exporter self-metrics
pub struct ApiMetrics {
    headers: Vec<String>,
    label_names: Vec<String>,
    series: DashMap<Vec<String>, Series>,
    records: AtomicU64,
    unmatched: AtomicU64,
    invalid: AtomicU64,
    reloads_ok: AtomicU64,
    reloads_failed: AtomicU64,
    spec_info: ArcSwapOption<SpecMeta>,
}

impl ApiMetrics {
    /// Registry labelling series with the given request headers in addition
    /// to `method`, `status` and `path`
    #[must_use]
    pub fn new(headers: &[String]) -> Self {
        let mut label_names: Vec<String> = ["method", "status", "path"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        label_names.extend(headers.iter().map(|h| header_label_name(h)));

        Self {
            headers: headers.to_vec(),
            label_names,
            series: DashMap::new(),
            records: AtomicU64::new(0),
            unmatched: AtomicU64::new(0),
            invalid: AtomicU64::new(0),
            reloads_ok: AtomicU64::new(0),
            reloads_failed: AtomicU64::new(0),
            spec_info: ArcSwapOption::empty(),
        }
    }

    #[must_use]
    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Count one well-formed record and, when it resolved, its series
    pub fn observe(&self, log: &GatewayLog, resolved: Option<&RouteMatch>) {
        self.records.fetch_add(1, Ordering::Relaxed);
        let Some(route) = resolved else {
            self.unmatched.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let mut labels = Vec::with_capacity(self.label_names.len());
        labels.push(route.method.as_str().to_string());
        labels.push(log.response.status.to_string());
        labels.push(route.template.clone());
        labels.extend(self.headers.iter().map(|h| log.header(h)));

        self.series.entry(labels).or_default().observe(log);
    }

    /// Count a record body that could not be parsed
    pub fn inc_invalid(&self) {
        self.invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish title and version for `apimeter_spec_info`
    pub fn set_spec_info(&self, meta: &SpecMeta) {
        self.spec_info.store(Some(Arc::new(meta.clone())));
    }

    /// Count a reload outcome; a success also refreshes the spec info gauge
    pub fn record_reload(&self, outcome: Result<&Specification, &SpecError>) {
        match outcome {
            Ok(spec) => {
                self.reloads_ok.fetch_add(1, Ordering::Relaxed);
                self.set_spec_info(spec.meta());
            }
            Err(_) => {
                self.reloads_failed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Hook for [`SpecStore::with_hook`](crate::hot_reload::SpecStore::with_hook)
    #[must_use]
    pub fn reload_hook(self: &Arc<Self>) -> ReloadHook {
        let metrics = Arc::clone(self);
        Arc::new(move |outcome: Result<&Specification, &SpecError>| {
            metrics.record_reload(outcome)
        })
    }

    /// Total well-formed records received
    #[must_use]
    pub fn records(&self) -> u64 {
        self.records.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn unmatched(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn invalid(&self) -> u64 {
        self.invalid.load(Ordering::Relaxed)
    }

    /// Request count of one series, by label values in label-name order
    #[must_use]
    pub fn request_count(&self, labels: &[&str]) -> u64 {
        let key: Vec<String> = labels.iter().map(|s| s.to_string()).collect();
        self.series
            .get(&key)
            .map(|s| s.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn snapshot(&self) -> Vec<SeriesSnapshot> {
        let mut out: Vec<SeriesSnapshot> = self
            .series
            .iter()
            .map(|entry| {
                let s = entry.value();
                SeriesSnapshot {
                    labels: entry.key().clone(),
                    count: s.count.load(Ordering::Relaxed),
                    buckets: std::array::from_fn(|i| s.buckets[i].load(Ordering::Relaxed)),
                    sum_ms: s.sum_ms.load(Ordering::Relaxed),
                }
            })
            .collect();
        out.sort_by(|a, b| a.labels.cmp(&b.labels));
        out
    }

    /// Prometheus text exposition (format 0.0.4)
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn label_set(&self, values: &[String], extra: Option<(&str, &str)>) -> String {
        let mut out = String::from("{");
        for (i, (name, value)) in self.label_names.iter().zip(values).enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}=\"{}\"", name, escape_label_value(value));
        }
        if let Some((name, value)) = extra {
            let _ = write!(out, ",{}=\"{}\"", name, escape_label_value(value));
        }
        out.push('}');
        out
    }
}

impl fmt::Display for ApiMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let series = self.snapshot();

        writeln!(f, "# HELP {REQUESTS_TOTAL} Total number of requests to the API")?;
        writeln!(f, "# TYPE {REQUESTS_TOTAL} counter")?;
        for s in &series {
            writeln!(f, "{REQUESTS_TOTAL}{} {}", self.label_set(&s.labels, None), s.count)?;
        }

        writeln!(f, "# HELP {REQUEST_DURATION} Request latency reported by the gateway in seconds")?;
        writeln!(f, "# TYPE {REQUEST_DURATION} histogram")?;
        for s in &series {
            let mut cumulative = 0;
            for (le, observed) in DURATION_BUCKETS.iter().zip(s.buckets) {
                cumulative += observed;
                let le = le.to_string();
                let labels = self.label_set(&s.labels, Some(("le", &le)));
                writeln!(f, "{REQUEST_DURATION}_bucket{labels} {cumulative}")?;
            }
            let labels = self.label_set(&s.labels, Some(("le", "+Inf")));
            writeln!(f, "{REQUEST_DURATION}_bucket{labels} {}", s.count)?;
            let labels = self.label_set(&s.labels, None);
            writeln!(f, "{REQUEST_DURATION}_sum{labels} {}", s.sum_ms as f64 / 1000.0)?;
            writeln!(f, "{REQUEST_DURATION}_count{labels} {}", s.count)?;
        }

        writeln!(f, "# HELP apimeter_log_records_total Access-log records received")?;
        writeln!(f, "# TYPE apimeter_log_records_total counter")?;
        writeln!(f, "apimeter_log_records_total {}", self.records())?;
        writeln!(f, "# HELP apimeter_log_records_unmatched_total Records that resolved to no declared route")?;
        writeln!(f, "# TYPE apimeter_log_records_unmatched_total counter")?;
        writeln!(f, "apimeter_log_records_unmatched_total {}", self.unmatched())?;
        writeln!(f, "# HELP apimeter_log_records_invalid_total Record bodies that could not be parsed")?;
        writeln!(f, "# TYPE apimeter_log_records_invalid_total counter")?;
        writeln!(f, "apimeter_log_records_invalid_total {}", self.invalid())?;

        writeln!(f, "# HELP apimeter_spec_reloads_total Specification reload attempts by result")?;
        writeln!(f, "# TYPE apimeter_spec_reloads_total counter")?;
        writeln!(
            f,
            "apimeter_spec_reloads_total{{result=\"failure\"}} {}",
            self.reloads_failed.load(Ordering::Relaxed)
        )?;
        writeln!(
            f,
            "apimeter_spec_reloads_total{{result=\"success\"}} {}",
            self.reloads_ok.load(Ordering::Relaxed)
        )?;

        if let Some(meta) = self.spec_info.load_full() {
            writeln!(f, "# HELP apimeter_spec_info Active specification")?;
            writeln!(f, "# TYPE apimeter_spec_info gauge")?;
            writeln!(
                f,
                "apimeter_spec_info{{title=\"{}\",version=\"{}\"}} 1",
                escape_label_value(&meta.title),
                escape_label_value(&meta.version)
            )?;
        }
        Ok(())
    }
}

fn escape_label_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_log::parse_log;
    use http::Method;

    fn users_match() -> RouteMatch {
        RouteMatch {
            method: Method::GET,
            template: "/api/v1/users/{userId}".to_string(),
            operation_id: Some("getUser".to_string()),
        }
    }

    fn log(status: u16, latency_ms: i64) -> GatewayLog {
        parse_log(
            format!(
                r#"{{"request":{{"method":"GET","uri":"/api/v1/users/1","headers":{{"X-Consumer-Username":"acme"}}}},
                    "response":{{"status":{status}}},"latencies":{{"request":{latency_ms}}}}}"#
            )
            .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn test_header_label_name() {
        assert_eq!(header_label_name("X-Consumer-Username"), "x_consumer_username");
        assert_eq!(header_label_name("tenant"), "tenant");
    }

    #[test]
    fn test_label_names_include_headers() {
        let m = ApiMetrics::new(&["X-Consumer-Username".to_string()]);
        assert_eq!(m.label_names(), ["method", "status", "path", "x_consumer_username"]);
    }

    #[test]
    fn test_observe_counts_series() {
        let m = ApiMetrics::new(&["X-Consumer-Username".to_string()]);
        m.observe(&log(200, 12), Some(&users_match()));
        m.observe(&log(200, 30), Some(&users_match()));
        m.observe(&log(404, 1), None);

        assert_eq!(m.records(), 3);
        assert_eq!(m.unmatched(), 1);
        assert_eq!(
            m.request_count(&["GET", "200", "/api/v1/users/{userId}", "acme"]),
            2
        );
        assert_eq!(m.request_count(&["GET", "404", "/api/v1/users/{userId}", "acme"]), 0);
    }

    #[test]
    fn test_render_histogram_is_cumulative() {
        let m = ApiMetrics::new(&[]);
        m.observe(&log(200, 3), Some(&users_match()));
        m.observe(&log(200, 40), Some(&users_match()));
        m.observe(&log(200, 20_000), Some(&users_match()));
        let text = m.render();

        let labels = r#"method="GET",status="200",path="/api/v1/users/{userId}""#;
        assert!(text.contains(&format!("http_requests_api_total{{{labels}}} 3")));
        assert!(text.contains(&format!(
            "http_request_duration_api_seconds_bucket{{{labels},le=\"0.005\"}} 1"
        )));
        assert!(text.contains(&format!(
            "http_request_duration_api_seconds_bucket{{{labels},le=\"0.05\"}} 2"
        )));
        assert!(text.contains(&format!(
            "http_request_duration_api_seconds_bucket{{{labels},le=\"10\"}} 2"
        )));
        assert!(text.contains(&format!(
            "http_request_duration_api_seconds_bucket{{{labels},le=\"+Inf\"}} 3"
        )));
        assert!(text.contains(&format!("http_request_duration_api_seconds_sum{{{labels}}} 20.043")));
        assert!(text.contains(&format!("http_request_duration_api_seconds_count{{{labels}}} 3")));
        assert!(text.contains("# TYPE http_request_duration_api_seconds histogram"));
    }

    #[test]
    fn test_render_is_sorted_and_escaped() {
        let m = ApiMetrics::new(&[]);
        let mut b = users_match();
        b.template = "/b".to_string();
        let mut a = users_match();
        a.template = "/a\"quoted\"".to_string();
        m.observe(&log(200, 1), Some(&b));
        m.observe(&log(200, 1), Some(&a));
        let text = m.render();
        let first = text.find(r#"path="/a\"quoted\"""#).unwrap();
        let second = text.find(r#"path="/b""#).unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_self_metrics() {
        let m = ApiMetrics::new(&[]);
        m.inc_invalid();
        m.set_spec_info(&SpecMeta {
            title: "Users".to_string(),
            version: "1.0".to_string(),
            ..SpecMeta::default()
        });
        let text = m.render();
        assert!(text.contains("apimeter_log_records_invalid_total 1"));
        assert!(text.contains("apimeter_spec_reloads_total{result=\"success\"} 0"));
        assert!(text.contains("apimeter_spec_info{title=\"Users\",version=\"1.0\"} 1"));
    }
}
