use async_trait::async_trait;
use reqwest::{redirect, Client, Proxy};
use url::Url;

use super::site::{wants_body, FetchOutcome, FetchedResponse};
use crate::{config::WebIoConfig, error::XrefError};

/// The network seam of the [`super::WebIoController`].
///
/// Implementations perform exactly one operation per call and never follow redirects; the
/// controller owns deduplication, caching and the concurrency budget.
#[async_trait]
pub trait WebBackend: Send + Sync {
    /// Whether `hostname` resolves to at least one address.
    async fn resolve_host(&self, hostname: &str) -> bool;

    /// Issue one GET for `url` (fragment already removed). The body is only read when the
    /// response content type starts with one of the `downloadable` prefixes.
    async fn fetch(&self, url: &Url, downloadable: &[String]) -> FetchOutcome;
}

/// [`WebBackend`] backed by `reqwest` and the system resolver.
pub struct HttpBackend {
    client: Client,
}

impl HttpBackend {
    pub fn new(config: &WebIoConfig) -> Result<Self, XrefError> {
        let mut builder = Client::builder()
            .redirect(redirect::Policy::none())
            .user_agent(config.user_agent.clone());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(Proxy::all(proxy.as_str())?);
        }
        Ok(HttpBackend {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl WebBackend for HttpBackend {
    async fn resolve_host(&self, hostname: &str) -> bool {
        match tokio::net::lookup_host((hostname, 80)).await {
            Ok(mut addresses) => addresses.next().is_some(),
            Err(e) => {
                tracing::debug!("[WebIo] Could not resolve {}: {}", hostname, e);
                false
            }
        }
    }

    async fn fetch(&self, url: &Url, downloadable: &[String]) -> FetchOutcome {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return FetchOutcome::TimedOut,
            Err(e) => return FetchOutcome::Failed(format!("{e}")),
        };

        let status = response.status();
        let version = response.version();
        let headers = response.headers().clone();
        let body = if status.is_success() && wants_body(&headers, downloadable) {
            match response.bytes().await {
                Ok(bytes) => Some(bytes.to_vec()),
                Err(e) if e.is_timeout() => return FetchOutcome::TimedOut,
                Err(e) => {
                    tracing::debug!("[WebIo] Reading body of {} failed: {}", url, e);
                    None
                }
            }
        } else {
            None
        };

        FetchOutcome::Response(FetchedResponse {
            status,
            version,
            headers,
            body,
        })
    }
}
