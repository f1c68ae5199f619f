//! # Hot Reload Module
//!
//! Keeps the active [`Specification`] current without restarting the
//! exporter.
//!
//! ## Snapshot model
//!
//! [`SpecStore`] holds the published specification behind an
//! [`ArcSwap`]. Resolvers call [`SpecStore::current`] and work on that `Arc`
//! for the duration of one record; a reload builds a complete new
//! specification off to the side and swaps the pointer only once every
//! method's tree has been built. Nobody ever observes a half-built tree.
//!
//! ## Triggers
//!
//! - [`spawn_reload_job`] re-fetches the source on a fixed interval, on its
//!   own thread, until the returned [`ReloadJob`] is stopped or dropped.
//! - [`watch_spec`] reloads a local file when the filesystem reports it was
//!   modified or re-created.
//!
//! ## Error Handling
//!
//! A failed fetch, parse or build leaves the previous snapshot in place. The
//! failure is logged at `warn`, reported to the store's hook, and the process
//! keeps serving.

use arc_swap::ArcSwap;
use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::router::Specification;
use crate::spec::{SpecError, SpecSource};

/// Observer for reload outcomes
pub type ReloadHook = Arc<dyn Fn(Result<&Specification, &SpecError>) + Send + Sync>;

/// Atomically replaceable handle to the active specification
pub struct SpecStore {
    current: ArcSwap<Specification>,
    hook: Option<ReloadHook>,
}

impl SpecStore {
    #[must_use]
    pub fn new(spec: Specification) -> Self {
        Self {
            current: ArcSwap::from_pointee(spec),
            hook: None,
        }
    }

    /// Register a callback invoked after every reload attempt
    #[must_use]
    pub fn with_hook(mut self, hook: ReloadHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Snapshot of the published specification
    #[must_use]
    pub fn current(&self) -> Arc<Specification> {
        self.current.load_full()
    }

    /// Publish a fully built specification, returning the one it replaces
    pub fn publish(&self, spec: Specification) -> Arc<Specification> {
        self.current.swap(Arc::new(spec))
    }

    /// Fetch, parse and build `source`, then publish it.
    ///
    /// On failure the previous snapshot stays active and the error is
    /// returned after being logged and reported to the hook.
    pub fn reload(&self, source: &SpecSource) -> Result<Arc<Specification>, SpecError> {
        let started = Instant::now();
        match source.load() {
            Ok(spec) => {
                if let Some(hook) = &self.hook {
                    hook(Ok(&spec));
                }
                let meta = spec.meta().clone();
                self.publish(spec);
                info!(
                    source = %source,
                    title = %meta.title,
                    version = %meta.version,
                    base_path = %meta.base_path,
                    endpoints = meta.endpoint_count,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Specification reloaded"
                );
                Ok(self.current())
            }
            Err(e) => {
                warn!(
                    source = %source,
                    error = %e,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Specification reload failed, keeping previous snapshot"
                );
                if let Some(hook) = &self.hook {
                    hook(Err(&e));
                }
                Err(e)
            }
        }
    }
}

impl fmt::Debug for SpecStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.load();
        f.debug_struct("SpecStore")
            .field("meta", current.meta())
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// Handle to a periodic reload thread. Stops the thread when dropped.
pub struct ReloadJob {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ReloadJob {
    /// Stop the job and wait for an in-flight reload to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Reload thread panicked");
            }
        }
    }
}

impl Drop for ReloadJob {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Reload `source` into `store` every `interval` on a dedicated thread
pub fn spawn_reload_job(
    store: Arc<SpecStore>,
    source: SpecSource,
    interval: Duration,
) -> std::io::Result<ReloadJob> {
    let (stop_tx, stop_rx) = mpsc::channel::<()>();

    let handle = std::thread::Builder::new()
        .name("apimeter-reload".to_string())
        .spawn(move || {
            info!(source = %source, interval_secs = interval.as_secs(), "Reload job started");
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        // Failures are logged and reported by the store
                        let _ = store.reload(&source);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!(source = %source, "Reload job stopped");
        })?;

    Ok(ReloadJob {
        stop: Some(stop_tx),
        handle: Some(handle),
    })
}

/// Watch a local specification file and reload `store` when it changes.
///
/// The watcher stops when the returned value is dropped.
pub fn watch_spec<P>(spec_path: P, store: Arc<SpecStore>) -> notify::Result<RecommendedWatcher>
where
    P: AsRef<Path>,
{
    let path: PathBuf = spec_path.as_ref().to_path_buf();
    let source = SpecSource::File(path.clone());

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    debug!(source = %source, kind = ?event.kind, "Specification file changed");
                    let _ = store.reload(&source);
                }
            }
            Err(e) => warn!(error = %e, "Specification watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&path, RecursiveMode::NonRecursive)?;
    info!(path = %path.display(), "Watching specification file");
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::load_spec_str;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const V1: &str = r#"
openapi: 3.1.0
info: { title: Store, version: "1" }
paths:
  /a:
    get:
      responses: { "200": { description: OK } }
"#;

    const V2: &str = r#"
openapi: 3.1.0
info: { title: Store, version: "2" }
paths:
  /b:
    get:
      responses: { "200": { description: OK } }
"#;

    #[test]
    fn test_publish_swaps_snapshot() {
        let store = SpecStore::new(load_spec_str(V1).unwrap());
        let before = store.current();
        let previous = store.publish(load_spec_str(V2).unwrap());

        assert_eq!(previous.meta().version, "1");
        assert_eq!(store.current().meta().version, "2");
        // A snapshot taken before the swap keeps resolving against its own trees
        assert!(before.resolve("GET", "/a").is_some());
        assert!(store.current().resolve("GET", "/a").is_none());
    }

    #[test]
    fn test_failed_reload_keeps_previous_and_reports() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        let hook: ReloadHook = Arc::new(move |outcome: Result<&Specification, &SpecError>| {
            if outcome.is_err() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        let store = SpecStore::new(load_spec_str(V1).unwrap()).with_hook(hook);

        let missing = SpecSource::File(PathBuf::from("/no/such/spec.yaml"));
        assert!(store.reload(&missing).is_err());
        assert_eq!(failures.load(Ordering::SeqCst), 1);
        assert_eq!(store.current().meta().version, "1");
    }

    #[test]
    fn test_reload_job_stops_on_drop() {
        let store = Arc::new(SpecStore::new(load_spec_str(V1).unwrap()));
        let missing = SpecSource::File(PathBuf::from("/no/such/spec.yaml"));
        let job = spawn_reload_job(store.clone(), missing, Duration::from_secs(3600)).unwrap();
        job.stop();
        assert_eq!(Arc::strong_count(&store), 1);
    }
}
