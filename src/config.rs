//! # Configuration Module
//!
//! The exporter reads one YAML file (default `./config.yaml`). Every section
//! and field is optional except `openapi.url`:
//!
//! ```yaml
//! log:
//!   level: info        # trace | debug | info | warn | error
//!   format: json       # json | pretty (`text` is accepted as pretty)
//! openapi:
//!   url: https://api.example.com/openapi.yaml   # or a local path / file:// URL
//!   reload_secs: 300   # periodic re-fetch; omit to disable
//!   watch: false       # reload a local file when it changes
//! prometheus:
//!   host: 0.0.0.0
//!   port: 8080
//!   path: /metrics
//! metrics:
//!   headers: [X-Consumer-Username]   # extra label per request header
//! ```
//!
//! `APIMETER_LOG_LEVEL` and `APIMETER_LOG_FORMAT` override the `log` section.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::metrics::header_label_name;
use crate::server::service::LOG_PATH;
use crate::spec::SpecSource;
use crate::validator::{fail_if_issues, format_issues, ValidationIssue};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "./config.yaml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 3] = ["json", "pretty", "text"];
const RESERVED_LABELS: [&str; 3] = ["method", "status", "path"];

static LABEL_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Failed to compile label name regex")
});

/// Failure to produce a usable [`Config`]
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid YAML for the configuration schema
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    /// One or more settings failed validation
    Invalid(Vec<ValidationIssue>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Invalid(issues) => write!(
                f,
                "invalid configuration, {} issue(s) found:\n{}",
                issues.len(),
                format_issues(issues)
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OpenApiSettings {
    /// `http(s)://` URL, `file://` URL or local path
    pub url: String,
    /// Seconds between periodic reloads; `None` disables the reload job
    pub reload_secs: Option<u64>,
    /// Reload a local file source on filesystem changes
    pub watch: bool,
}

impl OpenApiSettings {
    #[must_use]
    pub fn source(&self) -> SpecSource {
        SpecSource::parse(&self.url)
    }

    #[must_use]
    pub fn reload_interval(&self) -> Option<Duration> {
        self.reload_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrometheusSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl Default for PrometheusSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            path: "/metrics".to_string(),
        }
    }
}

impl PrometheusSettings {
    /// `host:port` as given, for binding
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Request headers copied into a label on every API series
    pub headers: Vec<String>,
}

/// Complete exporter configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log: LogSettings,
    pub openapi: OpenApiSettings,
    pub prometheus: PrometheusSettings,
    pub metrics: MetricsSettings,
}

impl Config {
    /// Parse a YAML document; missing fields take their defaults
    pub fn from_yaml(yaml: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str::<Option<Config>>(yaml)
            .map(Option::unwrap_or_default)
            .map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })
    }

    /// Read, parse, apply environment overrides and validate
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&yaml, path)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Like [`Config::load`], but a missing file means "all defaults"
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `APIMETER_LOG_LEVEL` / `APIMETER_LOG_FORMAT`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("APIMETER_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(format) = lookup("APIMETER_LOG_FORMAT") {
            self.log.format = format;
        }
    }

    /// Check every setting and fail with all problems found
    pub fn validate(&self) -> Result<(), ConfigError> {
        fail_if_issues(self.issues()).map_err(ConfigError::Invalid)
    }

    fn issues(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let level = self.log.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            issues.push(ValidationIssue::new(
                "log.level",
                "invalid",
                format!("'{}' is not one of {}", self.log.level, LOG_LEVELS.join(", ")),
            ));
        }
        let format = self.log.format.to_ascii_lowercase();
        if !LOG_FORMATS.contains(&format.as_str()) {
            issues.push(ValidationIssue::new(
                "log.format",
                "invalid",
                format!("'{}' is not one of {}", self.log.format, LOG_FORMATS.join(", ")),
            ));
        }

        let url = self.openapi.url.trim();
        if url.is_empty() {
            issues.push(ValidationIssue::new(
                "openapi.url",
                "missing",
                "a specification URL or file path is required",
            ));
        } else if let SpecSource::Url(u) = self.openapi.source() {
            if let Err(e) = url::Url::parse(&u) {
                issues.push(ValidationIssue::new(
                    "openapi.url",
                    "invalid",
                    format!("'{u}' is not a valid URL: {e}"),
                ));
            }
        }
        if self.openapi.reload_secs == Some(0) {
            issues.push(ValidationIssue::new(
                "openapi.reload_secs",
                "invalid",
                "reload interval must be at least one second",
            ));
        }
        if self.openapi.watch && matches!(self.openapi.source(), SpecSource::Url(_)) {
            issues.push(ValidationIssue::new(
                "openapi.watch",
                "invalid",
                "file watching requires a local specification path",
            ));
        }

        let path = &self.prometheus.path;
        if !path.starts_with('/') {
            issues.push(ValidationIssue::new(
                "prometheus.path",
                "invalid",
                format!("'{path}' must start with '/'"),
            ));
        } else if path == LOG_PATH || path == "/health" {
            issues.push(ValidationIssue::new(
                "prometheus.path",
                "conflict",
                format!("'{path}' is already served by the exporter"),
            ));
        }
        if self.prometheus.host.trim().is_empty() {
            issues.push(ValidationIssue::new("prometheus.host", "missing", "a bind host is required"));
        } else if self.prometheus.host.parse::<std::net::IpAddr>().is_err()
            && self.prometheus.host != "localhost"
        {
            issues.push(ValidationIssue::new(
                "prometheus.host",
                "invalid",
                format!("'{}' is not an IP address", self.prometheus.host),
            ));
        }

        let mut seen = HashSet::new();
        for (i, header) in self.metrics.headers.iter().enumerate() {
            let label = header_label_name(header);
            let location = format!("metrics.headers[{i}]");
            if !LABEL_NAME.is_match(&label) {
                issues.push(ValidationIssue::new(
                    location,
                    "invalid",
                    format!("'{header}' does not map to a valid label name ('{label}')"),
                ));
            } else if RESERVED_LABELS.contains(&label.as_str()) {
                issues.push(ValidationIssue::new(
                    location,
                    "conflict",
                    format!("'{header}' collides with the built-in '{label}' label"),
                ));
            } else if !seen.insert(label.clone()) {
                issues.push(ValidationIssue::new(
                    location,
                    "duplicate",
                    format!("'{header}' maps to label '{label}' more than once"),
                ));
            }
        }

        issues
    }

    /// Socket address for the HTTP server; only valid after [`Config::validate`]
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let host = match self.prometheus.host.as_str() {
            "localhost" => "127.0.0.1",
            h => h,
        };
        format!("{host}:{}", self.prometheus.port).parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        Config::from_yaml(yaml, Path::new("test.yaml")).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse("openapi:\n  url: ./openapi.yaml\n");
        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "json");
        assert_eq!(config.prometheus.port, 8080);
        assert_eq!(config.prometheus.path, "/metrics");
        assert_eq!(config.prometheus.bind_address(), "0.0.0.0:8080");
        assert!(config.metrics.headers.is_empty());
        assert_eq!(config.openapi.reload_interval(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_all_defaults() {
        assert_eq!(parse(""), Config::default());
    }

    #[test]
    fn test_full_document() {
        let config = parse(
            r#"
log: { level: debug, format: text }
openapi: { url: "https://example.com/openapi.yaml", reload_secs: 60 }
prometheus: { host: 127.0.0.1, port: 9100, path: /stats }
metrics: { headers: [X-Consumer-Username, x-tenant] }
"#,
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.openapi.reload_interval(), Some(Duration::from_secs(60)));
        assert_eq!(
            config.openapi.source(),
            SpecSource::Url("https://example.com/openapi.yaml".to_string())
        );
        assert_eq!(config.socket_addr(), Some("127.0.0.1:9100".parse().unwrap()));
    }

    #[test]
    fn test_validation_collects_every_issue() {
        let config = parse(
            r#"
log: { level: loud, format: xml }
openapi: { reload_secs: 0 }
prometheus: { path: metrics }
metrics: { headers: [Status, "1bad", x-a, X_A] }
"#,
        );
        let Err(ConfigError::Invalid(issues)) = config.validate() else {
            panic!("expected validation failure");
        };
        let locations: Vec<_> = issues.iter().map(|i| i.location.as_str()).collect();
        assert_eq!(
            locations,
            vec![
                "log.level",
                "log.format",
                "openapi.url",
                "openapi.reload_secs",
                "prometheus.path",
                "metrics.headers[0]",
                "metrics.headers[1]",
                "metrics.headers[3]",
            ]
        );
    }

    #[test]
    fn test_metrics_path_conflicts() {
        let mut config = parse("openapi: { url: spec.yaml }\n");
        config.prometheus.path = "/log".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_watch_requires_local_source() {
        let config = parse("openapi: { url: 'http://example.com/spec.yaml', watch: true }\n");
        let Err(ConfigError::Invalid(issues)) = config.validate() else {
            panic!("expected validation failure");
        };
        assert_eq!(issues[0].location, "openapi.watch");
    }

    #[test]
    fn test_overrides() {
        let mut config = parse("openapi: { url: spec.yaml }\n");
        config.apply_overrides(|key| match key {
            "APIMETER_LOG_LEVEL" => Some("trace".to_string()),
            _ => None,
        });
        assert_eq!(config.log.level, "trace");
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_unparsable_document() {
        let err = Config::from_yaml("log: [", Path::new("bad.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = Config::load("/no/such/config.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
