use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    net::IpAddr,
    sync::Arc,
};
use tokio::{runtime::Runtime, sync::Notify};
use url::Url;

use super::{
    backend::{HttpBackend, WebBackend},
    site::{CleanUrl, SiteInfo},
};
use crate::{config::WebIoConfig, error::XrefError, pending::PendingOperation};

/// Result of a non-blocking cache lookup.
#[derive(Debug, Clone)]
pub enum SiteLookup {
    Cached(Arc<SiteInfo>),
    Unknown,
    UnresolvableHostname,
    WebIoDisabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteCacheState {
    Cached,
    Unknown,
    UnresolvableHostname,
    WebIoDisabled,
}

impl SiteLookup {
    pub fn state(&self) -> SiteCacheState {
        match self {
            SiteLookup::Cached(_) => SiteCacheState::Cached,
            SiteLookup::Unknown => SiteCacheState::Unknown,
            SiteLookup::UnresolvableHostname => SiteCacheState::UnresolvableHostname,
            SiteLookup::WebIoDisabled => SiteCacheState::WebIoDisabled,
        }
    }
}

/// Counters describing the work the controller has issued so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WebIoStats {
    pub dns_lookups: usize,
    pub fetches: usize,
    pub busy: usize,
    pub peak_busy: usize,
    pub cached_sites: usize,
}

#[derive(Debug)]
enum HostState {
    /// Urls waiting for the host's resolution
    DnsPending(Vec<CleanUrl>),
    KnownGood,
    Unresolvable,
}

#[derive(Default)]
struct WebIoState {
    site_cache: HashMap<String, Arc<SiteInfo>>,
    /// Root operation per url key that is queued, waiting on DNS, or being fetched
    pending: HashMap<String, PendingOperation>,
    url_queue: VecDeque<CleanUrl>,
    hostname_queue: VecDeque<String>,
    hostnames: HashMap<String, HostState>,
    busy: usize,
    stats: WebIoStats,
}

struct Shared {
    state: Mutex<WebIoState>,
    work_available: Notify,
    backend: Arc<dyn WebBackend>,
    budget: usize,
    downloadable_content: BTreeMap<String, Vec<String>>,
}

/// Bounded-concurrency resolver for external urls.
///
/// Requests are deduplicated by [`CleanUrl`] key. Each host is resolved once before any of its
/// urls are fetched; urls on an unresolvable host complete without a fetch. Results are cached
/// for the lifetime of the controller. All network work runs on a private tokio runtime, driven
/// by a single coordinator task that is woken whenever work is queued or a worker finishes.
pub struct WebIoController {
    shared: Option<Arc<Shared>>,
    runtime: Option<Runtime>,
}

impl WebIoController {
    pub fn new(config: &WebIoConfig) -> Result<Self, XrefError> {
        if !config.enabled {
            return Ok(WebIoController::disabled());
        }
        let backend = Arc::new(HttpBackend::new(config)?);
        WebIoController::with_backend(config, backend)
    }

    pub fn with_backend(
        config: &WebIoConfig,
        backend: Arc<dyn WebBackend>,
    ) -> Result<Self, XrefError> {
        if !config.enabled {
            return Ok(WebIoController::disabled());
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("xref-webio")
            .enable_all()
            .build()?;

        let shared = Arc::new(Shared {
            state: Mutex::new(WebIoState::default()),
            work_available: Notify::new(),
            backend,
            budget: config.concurrency(),
            downloadable_content: config
                .downloadable_content
                .iter()
                .map(|(host, types)| (host.to_lowercase(), types.clone()))
                .collect(),
        });
        runtime.spawn(coordinate(shared.clone()));
        tracing::debug!(
            "[WebIo] Controller started with a budget of {} concurrent requests",
            shared.budget
        );

        Ok(WebIoController {
            shared: Some(shared),
            runtime: Some(runtime),
        })
    }

    pub fn disabled() -> Self {
        WebIoController {
            shared: None,
            runtime: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.is_some()
    }

    /// Non-blocking cache lookup.
    pub fn try_get_site_info(&self, url: &Url) -> SiteLookup {
        let Some(shared) = &self.shared else {
            return SiteLookup::WebIoDisabled;
        };
        let clean = CleanUrl::new(url.clone());
        let state = shared.state.lock();
        if let Some(info) = state.site_cache.get(clean.key()) {
            return SiteLookup::Cached(info.clone());
        }
        let unresolvable = clean
            .host_key()
            .and_then(|host| state.hostnames.get(&host))
            .map(|host_state| matches!(host_state, HostState::Unresolvable))
            .unwrap_or(false);
        if unresolvable {
            SiteLookup::UnresolvableHostname
        } else {
            SiteLookup::Unknown
        }
    }

    /// Ask for `url` to be resolved. The returned operation finishes once
    /// [`WebIoController::try_get_site_info`] no longer reports [`SiteLookup::Unknown`] for it.
    pub fn request_site_info(&self, url: &Url) -> PendingOperation {
        let Some(shared) = &self.shared else {
            return PendingOperation::completed();
        };
        let clean = CleanUrl::new(url.clone());
        let mut guard = shared.state.lock();
        let state = &mut *guard;

        if state.site_cache.contains_key(clean.key()) {
            return PendingOperation::completed();
        }
        if let Some(existing) = state.pending.get(clean.key()) {
            tracing::trace!("[WebIo] {} is already in flight", clean.key());
            return existing.attach();
        }

        let Some(host) = clean.host_key() else {
            state.site_cache.insert(
                clean.key().to_string(),
                Arc::new(SiteInfo::failed(clean.clone(), "url has no host")),
            );
            return PendingOperation::completed();
        };

        let is_ip = clean.host_is_ip() || host.parse::<IpAddr>().is_ok();
        match state.hostnames.get_mut(&host) {
            Some(HostState::Unresolvable) => return PendingOperation::completed(),
            Some(HostState::KnownGood) => state.url_queue.push_back(clean.clone()),
            Some(HostState::DnsPending(waiting)) => waiting.push(clean.clone()),
            None if is_ip => {
                state.hostnames.insert(host, HostState::KnownGood);
                state.url_queue.push_back(clean.clone());
            }
            None => {
                state
                    .hostnames
                    .insert(host.clone(), HostState::DnsPending(vec![clean.clone()]));
                state.hostname_queue.push_back(host);
            }
        }

        let root = PendingOperation::new();
        let handle = root.attach();
        state.pending.insert(clean.key().to_string(), root);
        drop(guard);

        shared.work_available.notify_one();
        handle
    }

    pub fn stats(&self) -> WebIoStats {
        match &self.shared {
            Some(shared) => {
                let state = shared.state.lock();
                WebIoStats {
                    busy: state.busy,
                    cached_sites: state.site_cache.len(),
                    ..state.stats
                }
            }
            None => WebIoStats::default(),
        }
    }
}

impl Drop for WebIoController {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn coordinate(shared: Arc<Shared>) {
    loop {
        shared.work_available.notified().await;
        schedule(&shared);
    }
}

/// Start as much queued work as the budget allows. DNS lookups go first, since they unblock
/// whole groups of urls.
fn schedule(shared: &Arc<Shared>) {
    let mut state = shared.state.lock();
    while state.busy < shared.budget {
        if let Some(host) = state.hostname_queue.pop_front() {
            state.busy += 1;
            state.stats.dns_lookups += 1;
            state.stats.peak_busy = state.stats.peak_busy.max(state.busy);
            tokio::spawn(resolve_hostname(shared.clone(), host));
        } else if let Some(url) = state.url_queue.pop_front() {
            state.busy += 1;
            state.stats.fetches += 1;
            state.stats.peak_busy = state.stats.peak_busy.max(state.busy);
            let downloadable = url
                .host_key()
                .and_then(|host| shared.downloadable_content.get(&host).cloned())
                .unwrap_or_default();
            tokio::spawn(fetch_site(shared.clone(), url, downloadable));
        } else {
            break;
        }
    }
}

async fn resolve_hostname(shared: Arc<Shared>, host: String) {
    let resolved = shared.backend.resolve_host(&host).await;
    tracing::debug!("[WebIo] Resolved {}: {}", host, resolved);

    let mut failed = Vec::new();
    {
        let mut state = shared.state.lock();
        state.busy -= 1;
        let new_state = if resolved {
            HostState::KnownGood
        } else {
            HostState::Unresolvable
        };
        if let Some(HostState::DnsPending(waiting)) = state.hostnames.insert(host, new_state) {
            if resolved {
                state.url_queue.extend(waiting);
            } else {
                for url in waiting {
                    if let Some(op) = state.pending.remove(url.key()) {
                        failed.push(op);
                    }
                }
            }
        }
    }
    for op in failed {
        op.signal_completed();
    }
    shared.work_available.notify_one();
}

async fn fetch_site(shared: Arc<Shared>, url: CleanUrl, downloadable: Vec<String>) {
    let outcome = shared
        .backend
        .fetch(&url.without_fragment(), &downloadable)
        .await;
    let info = Arc::new(SiteInfo::from_outcome(url.clone(), outcome));
    tracing::debug!(
        "[WebIo] Fetched {} (status: {:?}, redirect: {}, failed: {}, timed out: {})",
        url.key(),
        info.status,
        info.is_redirect,
        info.request_failed,
        info.request_timed_out
    );

    let op = {
        let mut state = shared.state.lock();
        state.busy -= 1;
        state.site_cache.insert(url.key().to_string(), info);
        state.pending.remove(url.key())
    };
    if let Some(op) = op {
        op.signal_completed();
    }
    shared.work_available.notify_one();
}
