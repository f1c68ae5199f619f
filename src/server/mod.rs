//! # Server Module
//!
//! HTTP surface of the exporter, served by `may_minihttp` on coroutines:
//!
//! | Route                 | Behaviour                                              |
//! |-----------------------|--------------------------------------------------------|
//! | `POST /log`           | ingest one gateway access-log record                   |
//! | `GET <metrics path>`  | Prometheus text exposition (default `/metrics`)        |
//! | `GET /health`         | `{"status":"ok"}`                                      |
//!
//! Any other method on `/log` is answered with 405, anything else with a
//! JSON 404.

pub mod http_server;
pub mod response;
pub mod service;

pub use http_server::{HttpServer, ServerHandle};
pub use service::{health_endpoint, metrics_endpoint, ExporterService, IngestOutcome};
