//! Structured logging setup.
//!
//! Builds a `tracing-subscriber` registry from the `log` configuration
//! section:
//! - `EnvFilter`: `RUST_LOG` wins over the configured level,
//! - a sampling layer that can thin out info/debug noise while always
//!   keeping warnings and errors,
//! - a `fmt` layer in JSON (production) or pretty (development) form,
//!   optionally behind a `tracing-appender` non-blocking writer.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//!
//! Sampling and buffering are tuned with environment variables:
//! `APIMETER_LOG_SAMPLING_MODE` (`all` | `error-only` | `sampled`),
//! `APIMETER_LOG_SAMPLING_RATE` (0.0-1.0), `APIMETER_LOG_ASYNC` (bool),
//! `APIMETER_LOG_INCLUDE_LOCATION` (bool).

use anyhow::{Context, Result};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::subscriber::Interest;
use tracing::{Event, Level, Metadata, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LogSettings;

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// `pretty` and `text` select [`LogFormat::Pretty`]; anything else is JSON
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Sampling mode: how to decide which logs to emit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    /// Log everything the filter lets through
    All,
    /// Log only WARN and ERROR levels
    ErrorOnly,
    /// Keep one in `1 / rate` events below WARN, all WARN and ERROR
    Sampled,
}

impl SamplingMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error-only" | "error_only" => SamplingMode::ErrorOnly,
            "sampled" => SamplingMode::Sampled,
            _ => SamplingMode::All,
        }
    }
}

/// Complete logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub level: String,
    pub format: LogFormat,
    pub sampling_mode: SamplingMode,
    /// Rate (0.0-1.0) for [`SamplingMode::Sampled`]
    pub sampling_rate: f64,
    /// Write through a background thread
    pub async_logging: bool,
    /// Include file:line in every event
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: true,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Configured level and format, plus sampling and buffering from the environment
    pub fn from_settings(settings: &LogSettings) -> Self {
        Self::from_lookup(settings, |key| env::var(key).ok())
    }

    fn from_lookup(settings: &LogSettings, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            level: settings.level.to_lowercase(),
            format: LogFormat::parse(&settings.format),
            sampling_mode: lookup("APIMETER_LOG_SAMPLING_MODE")
                .map(|s| SamplingMode::parse(&s))
                .unwrap_or(defaults.sampling_mode),
            sampling_rate: lookup("APIMETER_LOG_SAMPLING_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sampling_rate),
            async_logging: lookup("APIMETER_LOG_ASYNC")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.async_logging),
            include_location: lookup("APIMETER_LOG_INCLUDE_LOCATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.include_location),
        }
    }

    fn level(&self) -> Level {
        match self.level.as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

/// Sampling layer: decides whether to emit a log based on sampling rules
pub struct SamplingLayer {
    mode: SamplingMode,
    sampling_rate: f64,
    counter: AtomicU64,
}

impl SamplingLayer {
    pub fn new(mode: SamplingMode, sampling_rate: f64) -> Self {
        Self {
            mode,
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
            counter: AtomicU64::new(0),
        }
    }

    /// Whether the decision for this callsite differs from event to event
    fn varies_per_event(&self, metadata: &Metadata<'_>) -> bool {
        self.mode == SamplingMode::Sampled
            && metadata.is_event()
            && !is_severe(metadata)
            && self.sampling_rate > 0.0
            && self.sampling_rate < 1.0
    }

    fn should_sample(&self, metadata: &Metadata<'_>) -> bool {
        let severe = is_severe(metadata);
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => severe,
            SamplingMode::Sampled => {
                if severe {
                    return true;
                }
                if self.sampling_rate <= 0.0 {
                    return false;
                }
                let count = self.counter.fetch_add(1, Ordering::Relaxed);
                let interval = (1.0 / self.sampling_rate) as u64;
                interval > 0 && count % interval == 0
            }
        }
    }
}

fn is_severe(metadata: &Metadata<'_>) -> bool {
    matches!(metadata.level(), &Level::WARN | &Level::ERROR)
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn register_callsite(&self, metadata: &'static Metadata<'static>) -> Interest {
        // A cached always/never would freeze the first sampling decision
        if self.varies_per_event(metadata) {
            Interest::sometimes()
        } else if !metadata.is_event() || self.should_sample(metadata) {
            Interest::always()
        } else {
            Interest::never()
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        // Spans are never sampled away; only events are thinned
        !metadata.is_event() || self.should_sample(metadata)
    }

    fn on_event(&self, _event: &Event<'_>, _ctx: LayerContext<'_, S>) {}
}

/// Install the global subscriber.
///
/// With async logging the returned guard must be held until exit so buffered
/// lines are flushed.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level().as_str()))
        .add_directive(
            "may_minihttp=warn"
                .parse()
                .context("Invalid may_minihttp log directive")?,
        );

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate));

    let (writer, guard) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stderr());
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking),
            Some(guard),
        )
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stderr),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    registry
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingLayer(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for CountingLayer {
        fn on_event(&self, _event: &Event<'_>, _ctx: LayerContext<'_, S>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn count_emitted(layer: SamplingLayer, emit: impl FnOnce()) -> usize {
        let seen = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry()
            .with(layer)
            .with(CountingLayer(Arc::clone(&seen)));
        tracing::subscriber::with_default(subscriber, emit);
        seen.load(Ordering::SeqCst)
    }

    #[test]
    fn test_sampled_mode_thins_one_callsite() {
        let emitted = count_emitted(SamplingLayer::new(SamplingMode::Sampled, 0.5), || {
            for i in 0..100 {
                tracing::info!(i, "sampled event");
            }
        });
        assert!((45..=55).contains(&emitted), "emitted {emitted} of 100");
    }

    #[test]
    fn test_sampled_mode_keeps_warnings() {
        let emitted = count_emitted(SamplingLayer::new(SamplingMode::Sampled, 0.1), || {
            for i in 0..20 {
                tracing::warn!(i, "kept event");
            }
        });
        assert_eq!(emitted, 20);
    }

    #[test]
    fn test_error_only_mode() {
        let emitted = count_emitted(SamplingLayer::new(SamplingMode::ErrorOnly, 1.0), || {
            for i in 0..10 {
                tracing::info!(i, "dropped event");
                tracing::error!(i, "kept event");
            }
        });
        assert_eq!(emitted, 10);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("text"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("other"), LogFormat::Json);
    }

    #[test]
    fn test_sampling_mode_parse() {
        assert_eq!(SamplingMode::parse("all"), SamplingMode::All);
        assert_eq!(SamplingMode::parse("error_only"), SamplingMode::ErrorOnly);
        assert_eq!(SamplingMode::parse("sampled"), SamplingMode::Sampled);
        assert_eq!(SamplingMode::parse("unknown"), SamplingMode::All);
    }

    #[test]
    fn test_from_settings_with_overrides() {
        let settings = LogSettings {
            level: "DEBUG".to_string(),
            format: "text".to_string(),
        };
        let config = LogConfig::from_lookup(&settings, |key| match key {
            "APIMETER_LOG_SAMPLING_MODE" => Some("sampled".to_string()),
            "APIMETER_LOG_SAMPLING_RATE" => Some("0.25".to_string()),
            "APIMETER_LOG_ASYNC" => Some("false".to_string()),
            _ => None,
        });
        assert_eq!(config.level(), Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.sampling_mode, SamplingMode::Sampled);
        assert_eq!(config.sampling_rate, 0.25);
        assert!(!config.async_logging);
        assert!(!config.include_location);
    }
}
