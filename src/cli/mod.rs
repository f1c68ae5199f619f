//! # CLI Module
//!
//! Command-line entry points of the `apimeter` binary.
//!
//! ## Commands
//!
//! ### `metrics`
//!
//! Run the exporter: load the configuration, load the OpenAPI description,
//! keep it fresh (periodic reload and/or file watch) and serve `POST /log`,
//! the metrics page and `/health` until SIGINT or SIGTERM:
//!
//! ```bash
//! apimeter metrics --config config.yaml
//! ```
//!
//! ### `visualize`
//!
//! Write one Graphviz document per HTTP method describing the route trees:
//!
//! ```bash
//! apimeter visualize --file openapi.yaml --out graph
//! dot -Tpng graph/GET.dot -o GET.png
//! ```
//!
//! ### `routes`
//!
//! List every declared `METHOD template`, base path included.
//!
//! ### `resolve`
//!
//! Resolve a single request the way the exporter would. Exits with status 1
//! when nothing matches:
//!
//! ```bash
//! apimeter resolve --url https://api.example.com/openapi.yaml GET /api/v1/users/42
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use apimeter::cli::{run_cli, Cli};
//! use clap::Parser;
//!
//! let code = run_cli(Cli::parse())?;
//! ```

mod commands;


pub use commands::{run_cli, Cli, Commands, SourceArgs};
