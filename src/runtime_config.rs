//! # Runtime Configuration Module
//!
//! Coroutine runtime tuning read from the environment at startup.
//!
//! ## Environment Variables
//!
//! ### `APIMETER_STACK_SIZE`
//!
//! Stack size for each HTTP connection coroutine. Accepts decimal (`16384`)
//! or hexadecimal (`0x4000`). Default: `0x4000` (16 KB). Ingestion handlers
//! are shallow, so the default is rarely worth changing.
//!
//! ### `APIMETER_WORKERS`
//!
//! Number of scheduler worker threads. Defaults to the `may` runtime's own
//! choice (one per CPU).

use std::env;
use tracing::{info, warn};

const DEFAULT_STACK_SIZE: usize = 0x4000;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes
    pub stack_size: usize,
    /// Scheduler worker threads; `None` keeps the runtime default
    pub workers: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            workers: None,
        }
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal size
#[must_use]
pub fn parse_size(val: &str) -> Option<usize> {
    let val = val.trim();
    match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    }
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparsable values fall back to the defaults with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = env::var("APIMETER_STACK_SIZE") {
            match parse_size(&val) {
                Some(size) if size > 0 => config.stack_size = size,
                _ => warn!(value = %val, "Ignoring invalid APIMETER_STACK_SIZE"),
            }
        }
        if let Ok(val) = env::var("APIMETER_WORKERS") {
            match val.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.workers = Some(n),
                _ => warn!(value = %val, "Ignoring invalid APIMETER_WORKERS"),
            }
        }
        config
    }

    /// Apply to the global `may` scheduler; call before starting the server
    pub fn apply(&self) {
        let may_config = may::config();
        may_config.set_stack_size(self.stack_size);
        if let Some(workers) = self.workers {
            may_config.set_workers(workers);
        }
        info!(
            stack_size = self.stack_size,
            workers = ?self.workers,
            "Coroutine runtime configured"
        );
    }
}
