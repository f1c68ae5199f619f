use super::response::{write_json, write_json_error, write_text, PROMETHEUS_CONTENT_TYPE};
use crate::access_log::parse_log;
use crate::hot_reload::SpecStore;
use crate::metrics::ApiMetrics;
use crate::router::RouteMatch;
use may_minihttp::{HttpService, Request, Response};
use serde_json::json;
use std::io::{self, Read};
use std::sync::Arc;
use tracing::{debug, trace};

/// Route that receives gateway access-log records
pub const LOG_PATH: &str = "/log";

/// Result of ingesting one record body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Record resolved to a declared route and was counted under it
    Matched(RouteMatch),
    /// Well-formed record with no declared route
    Unmatched,
    /// Body is not a valid access-log record
    Invalid(String),
}

/// HTTP service exposing log ingestion, metrics and health
#[derive(Clone)]
pub struct ExporterService {
    store: Arc<SpecStore>,
    metrics: Arc<ApiMetrics>,
    metrics_path: Arc<str>,
}

impl ExporterService {
    pub fn new(store: Arc<SpecStore>, metrics: Arc<ApiMetrics>, metrics_path: &str) -> Self {
        Self {
            store,
            metrics,
            metrics_path: Arc::from(metrics_path),
        }
    }

    #[must_use]
    pub fn metrics(&self) -> &Arc<ApiMetrics> {
        &self.metrics
    }

    /// Parse one record, resolve it against the current snapshot and count it
    pub fn ingest(&self, body: &[u8]) -> IngestOutcome {
        let log = match parse_log(body) {
            Ok(log) => log,
            Err(e) => {
                self.metrics.inc_invalid();
                debug!(error = %e, body_size = body.len(), "Rejected malformed access-log record");
                return IngestOutcome::Invalid(e.to_string());
            }
        };

        let spec = self.store.current();
        let resolved = spec.resolve(&log.request.method, &log.request.uri);
        self.metrics.observe(&log, resolved.as_ref());

        match resolved {
            Some(route) => {
                trace!(
                    method = %route.method,
                    uri = %log.request.uri,
                    template = %route.template,
                    status = log.response.status,
                    "Record attributed"
                );
                IngestOutcome::Matched(route)
            }
            None => {
                debug!(
                    method = %log.request.method,
                    uri = %log.request.uri,
                    "No declared route for record"
                );
                IngestOutcome::Unmatched
            }
        }
    }

    fn log_endpoint(&self, req: Request, res: &mut Response) -> io::Result<()> {
        let mut body = Vec::new();
        if let Err(e) = req.body().read_to_end(&mut body) {
            debug!(error = %e, "Failed to read request body");
            write_json_error(res, 400, "unreadable request body");
            return Ok(());
        }

        match self.ingest(&body) {
            IngestOutcome::Matched(route) => write_json(
                res,
                200,
                &json!({ "matched": true, "route": route.template }),
            ),
            IngestOutcome::Unmatched => write_json(res, 200, &json!({ "matched": false })),
            IngestOutcome::Invalid(reason) => write_json_error(res, 400, &reason),
        }
        Ok(())
    }
}

/// Basic health check endpoint returning `{ "status": "ok" }`.
pub fn health_endpoint(res: &mut Response) -> io::Result<()> {
    write_json(res, 200, &json!({ "status": "ok" }));
    Ok(())
}

/// Metrics endpoint returning Prometheus text format.
pub fn metrics_endpoint(res: &mut Response, metrics: &ApiMetrics) -> io::Result<()> {
    write_text(res, 200, PROMETHEUS_CONTENT_TYPE, metrics.render());
    Ok(())
}

impl HttpService for ExporterService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let method = req.method().to_string();
        let raw_path = req.path().to_string();
        let path = raw_path.split('?').next().unwrap_or_default();

        if path == LOG_PATH {
            if method == "POST" {
                return self.log_endpoint(req, res);
            }
            res.header("Allow: POST");
            write_json_error(res, 405, "method not allowed");
            return Ok(());
        }
        if method == "GET" && path == &*self.metrics_path {
            return metrics_endpoint(res, &self.metrics);
        }
        if method == "GET" && path == "/health" {
            return health_endpoint(res);
        }

        debug!(method = %method, path = %path, "Unknown route");
        write_json_error(res, 404, "not found");
        Ok(())
    }
}
