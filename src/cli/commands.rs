use crate::{
    config::{Config, DEFAULT_CONFIG_PATH},
    hot_reload::{spawn_reload_job, watch_spec, SpecStore},
    logging::{init_logging, LogConfig, LogFormat},
    metrics::ApiMetrics,
    router::Specification,
    runtime_config::RuntimeConfig,
    server::{ExporterService, HttpServer, ServerHandle},
    spec::SpecSource,
    visualize::write_dot_files,
};
use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;

/// Command-line interface for apimeter
#[derive(Parser, Debug)]
#[command(name = "apimeter", version)]
#[command(about = "Per-endpoint metrics for API gateway access logs", long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Where to read the OpenAPI description from; exactly one is required
#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct SourceArgs {
    /// URL of the OpenAPI description (http, https or file)
    #[arg(long)]
    pub url: Option<String>,

    /// Path to a local OpenAPI description (YAML or JSON)
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl SourceArgs {
    pub fn source(&self) -> Result<SpecSource> {
        match (&self.url, &self.file) {
            (Some(url), _) => Ok(SpecSource::parse(url)),
            (None, Some(file)) => Ok(SpecSource::File(file.clone())),
            (None, None) => Err(anyhow!("either --url or --file is required")),
        }
    }

    fn load(&self) -> Result<Specification> {
        let source = self.source()?;
        source
            .load()
            .with_context(|| format!("Failed to load OpenAPI specification from {source}"))
    }
}

/// Available apimeter commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the metrics exporter
    Metrics {
        /// Configuration file (YAML)
        #[arg(short, long, env = "APIMETER_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Write Graphviz DOT files of the route trees, one per method
    Visualize {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory
        #[arg(short, long, default_value = "graph")]
        out: PathBuf,
    },
    /// List declared routes
    Routes {
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Resolve one request against the declared routes
    Resolve {
        #[command(flatten)]
        source: SourceArgs,

        /// HTTP method, e.g. GET
        method: String,

        /// Request URI as logged by the gateway, e.g. /api/v1/users/42?x=1
        uri: String,
    },
}

/// Execute the parsed command.
///
/// `resolve` returns [`ExitCode::FAILURE`] when nothing matches; every other
/// failure is an error.
pub fn run_cli(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Metrics { config } => run_metrics(config),
        Commands::Visualize { source, out } => {
            init_tool_logging();
            let spec = source.load()?;
            let written = write_dot_files(&spec, &out)
                .with_context(|| format!("Failed to write graphs to {}", out.display()))?;
            for path in written {
                println!("{}", path.display());
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Routes { source } => {
            init_tool_logging();
            let spec = source.load()?;
            for (method, leaf) in spec.routes() {
                let template = spec.canonical_template(&leaf.template);
                match &leaf.operation_id {
                    Some(id) => println!("{method} {template} ({id})"),
                    None => println!("{method} {template}"),
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve {
            source,
            method,
            uri,
        } => {
            init_tool_logging();
            let spec = source.load()?;
            match spec.resolve(&method, &uri) {
                Some(route) => {
                    println!("{} {}", route.method, route.template);
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("no match");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Warnings only, human readable, for the one-shot commands
fn init_tool_logging() {
    let config = LogConfig {
        level: "warn".to_string(),
        format: LogFormat::Pretty,
        async_logging: false,
        ..LogConfig::default()
    };
    // A subscriber may already be installed when called from tests
    let _ = init_logging(&config);
}

fn run_metrics(config_path: Option<PathBuf>) -> Result<ExitCode> {
    let config = match &config_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(DEFAULT_CONFIG_PATH)?,
    };

    let _log_guard = init_logging(&LogConfig::from_settings(&config.log))?;
    RuntimeConfig::from_env().apply();

    let source = config.openapi.source();
    let spec = source
        .load()
        .with_context(|| format!("Failed to load OpenAPI specification from {source}"))?;
    info!(
        source = %source,
        title = %spec.meta().title,
        version = %spec.meta().version,
        base_path = %spec.meta().base_path,
        endpoints = spec.meta().endpoint_count,
        "Specification loaded"
    );

    let metrics = Arc::new(ApiMetrics::new(&config.metrics.headers));
    metrics.set_spec_info(spec.meta());
    let store = Arc::new(SpecStore::new(spec).with_hook(metrics.reload_hook()));

    let _reload_job = match config.openapi.reload_interval() {
        Some(interval) => Some(
            spawn_reload_job(Arc::clone(&store), source.clone(), interval)
                .context("Failed to start reload job")?,
        ),
        None => None,
    };
    let _watcher = match (&source, config.openapi.watch) {
        (SpecSource::File(path), true) => Some(
            watch_spec(path, Arc::clone(&store))
                .with_context(|| format!("Failed to watch {}", path.display()))?,
        ),
        // Rejected by config validation for URL sources
        _ => None,
    };

    let addr = config
        .socket_addr()
        .ok_or_else(|| anyhow!("Invalid listen address {}", config.prometheus.bind_address()))?;
    let service = ExporterService::new(store, metrics, &config.prometheus.path);
    let handle = HttpServer(service)
        .start(addr)
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(
        addr = %handle.addr(),
        metrics_path = %config.prometheus.path,
        "Exporter listening"
    );

    wait_for_shutdown(handle)?;
    info!("Exporter stopped");
    Ok(ExitCode::SUCCESS)
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown signal received");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> Result<()> {
    handle
        .join()
        .map_err(|_| anyhow!("HTTP server thread panicked"))
}
