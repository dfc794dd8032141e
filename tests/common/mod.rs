//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use async_trait::async_trait;
use http::{header::LOCATION, HeaderValue, StatusCode};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tempfile::TempDir;
use url::Url;
use xref_core::{
    config::Config,
    webio::{FetchOutcome, FetchedResponse, WebBackend},
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Config rooted at `/ctx` with web IO switched off.
#[allow(dead_code)]
pub fn offline_config() -> Config {
    let mut config = Config::new("/ctx");
    config.web_io.enabled = false;
    config
}

/// Config rooted at `/ctx` with web IO on, for use with a [`CountingBackend`].
#[allow(dead_code)]
pub fn online_config(concurrency: usize) -> Config {
    let mut config = Config::new("/ctx");
    config.web_io.maximum_request_concurrency = concurrency;
    config
}

/// Write `files` (relative path, content) below a fresh `docs/` directory.
#[allow(dead_code)]
pub fn create_docs(temp_dir: &TempDir, files: &[(&str, &str)]) -> PathBuf {
    let root = temp_dir.path().join("docs");
    std::fs::create_dir(&root).unwrap();
    for (path, content) in files {
        let full_path = root.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full_path, content).unwrap();
    }
    root
}

#[allow(dead_code)]
pub fn write(root: &Path, path: &str, content: &str) {
    std::fs::write(root.join(path), content).unwrap();
}

/// In-memory [`WebBackend`] that records every call it receives.
///
/// Urls without a configured outcome answer `200 OK`. Every call sleeps for `latency` first, so
/// tests can observe concurrent requests piling up.
#[derive(Default)]
pub struct CountingBackend {
    latency: Duration,
    unresolvable: HashSet<String>,
    outcomes: HashMap<String, FetchOutcome>,
    dns_calls: Mutex<Vec<String>>,
    fetch_calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

#[allow(dead_code)]
impl CountingBackend {
    pub fn new() -> Self {
        CountingBackend::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn unresolvable(mut self, host: &str) -> Self {
        self.unresolvable.insert(host.to_string());
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.outcomes.insert(
            url.to_string(),
            FetchOutcome::Response(FetchedResponse::new(status)),
        );
        self
    }

    pub fn redirect(mut self, url: &str, location: &str) -> Self {
        let mut response = FetchedResponse::new(StatusCode::FOUND);
        response
            .headers
            .insert(LOCATION, HeaderValue::from_str(location).unwrap());
        self.outcomes
            .insert(url.to_string(), FetchOutcome::Response(response));
        self
    }

    pub fn outcome(mut self, url: &str, outcome: FetchOutcome) -> Self {
        self.outcomes.insert(url.to_string(), outcome);
        self
    }

    pub fn dns_calls(&self) -> Vec<String> {
        self.dns_calls.lock().clone()
    }

    pub fn fetch_calls(&self) -> Vec<String> {
        self.fetch_calls.lock().clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WebBackend for CountingBackend {
    async fn resolve_host(&self, hostname: &str) -> bool {
        self.dns_calls.lock().push(hostname.to_string());
        self.enter().await;
        self.leave();
        !self.unresolvable.contains(hostname)
    }

    async fn fetch(&self, url: &Url, _downloadable: &[String]) -> FetchOutcome {
        self.fetch_calls.lock().push(url.to_string());
        self.enter().await;
        self.leave();
        self.outcomes
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| FetchOutcome::Response(FetchedResponse::new(StatusCode::OK)))
    }
}
