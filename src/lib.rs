//! # apimeter
//!
//! **apimeter** turns API gateway access logs into per-endpoint Prometheus
//! metrics. Every logged request is attributed to the path template declared
//! in an [OpenAPI 3](https://spec.openapis.org/oas/v3.1.0) description, so
//! `/api/v1/users/42` and `/api/v1/users/7` are counted together under
//! `/api/v1/users/{userId}`.
//!
//! ## Architecture
//!
//! - **[`spec`]** - load the OpenAPI document (file or URL, YAML or JSON) and
//!   extract base path, metadata and the declared operations
//! - **[`router`]** - per-method route trees with typed parameter
//!   recognizers and backtracking resolution
//! - **[`hot_reload`]** - atomically swapped specification snapshots,
//!   periodic and file-watch reload
//! - **[`access_log`]** - Kong HTTP-log record model
//! - **[`metrics`]** - counter and latency histogram per route, Prometheus
//!   text exposition
//! - **[`server`]** - `POST /log`, metrics and health endpoints on
//!   `may_minihttp`
//! - **[`config`]**, **[`logging`]**, **[`runtime_config`]** - YAML
//!   configuration, `tracing` setup, coroutine runtime tuning
//! - **[`visualize`]** - Graphviz rendering of the route trees
//! - **[`cli`]** - the `apimeter` binary
//!
//! ### Record flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Kong
//!     participant Server as ExporterService<br/>(may_minihttp)
//!     participant Store as SpecStore
//!     participant Spec as Specification
//!     participant Metrics as ApiMetrics
//!
//!     Kong->>Server: POST /log (JSON record)
//!     Server->>Server: parse_log
//!     alt Malformed record
//!         Server-->>Kong: 400
//!     end
//!     Server->>Store: current()
//!     Store-->>Server: Arc<Specification>
//!     Server->>Spec: resolve(method, uri)
//!     Spec-->>Server: Option<RouteMatch>
//!     Server->>Metrics: observe(record, match)
//!     Server-->>Kong: 200
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use apimeter::load_spec;
//!
//! let spec = load_spec("openapi.yaml").expect("Failed to load spec");
//! if let Some(route) = spec.resolve("GET", "/api/v1/users/42?expand=true") {
//!     println!("{} {}", route.method, route.template);
//! }
//! ```
//!
//! ## Runtime Considerations
//!
//! The HTTP server runs on the `may` coroutine runtime. Coroutine stack size
//! and worker count are read from `APIMETER_STACK_SIZE` and
//! `APIMETER_WORKERS`. Resolution itself is synchronous and lock-free; a
//! reload never blocks readers.

pub mod access_log;
pub mod cli;
pub mod config;
pub mod hot_reload;
pub mod logging;
pub mod metrics;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod spec;
pub mod validator;
pub mod visualize;

pub use hot_reload::SpecStore;
pub use router::{RouteMatch, Specification};
pub use spec::{load_spec, load_spec_str, SpecError, SpecSource};
