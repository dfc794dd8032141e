//! Shared test utilities for parser and context tests

use async_trait::async_trait;
use http::{header::LOCATION, HeaderValue, StatusCode};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use url::Url;

use crate::{
    config::{Config, Pipeline},
    parsing::{FileId, ParsingResult},
    warnings::{Warning, WarningId},
    webio::{FetchOutcome, FetchedResponse, WebBackend},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn offline_config() -> Config {
    let mut config = Config::new("/ctx");
    config.web_io.enabled = false;
    config
}

pub fn offline_pipeline() -> Pipeline {
    Pipeline::new(offline_config()).unwrap()
}

/// Parse `source` as the file `relative_path` of an offline context rooted at `/ctx`.
pub fn parse(relative_path: &str, source: &str) -> ParsingResult {
    parse_with(&offline_pipeline(), relative_path, source)
}

pub fn parse_with(pipeline: &Pipeline, relative_path: &str, source: &str) -> ParsingResult {
    pipeline
        .parsers
        .parse(pipeline, FileId(0), relative_path, Arc::from(source))
}

pub fn ids(warnings: &[Warning]) -> Vec<WarningId> {
    let mut ids: Vec<WarningId> = warnings.iter().map(|w| w.id).collect();
    ids.sort();
    ids
}

pub fn find(warnings: &[Warning], id: WarningId) -> &Warning {
    warnings
        .iter()
        .find(|w| w.id == id)
        .unwrap_or_else(|| panic!("no {id} warning in {warnings:#?}"))
}

/// In-memory [`WebBackend`] answering from fixed tables.
#[derive(Default)]
pub struct StaticBackend {
    pub unresolvable: HashSet<String>,
    pub responses: HashMap<String, FetchOutcome>,
    pub fetched: Mutex<Vec<String>>,
}

impl StaticBackend {
    pub fn new() -> Self {
        StaticBackend::default()
    }

    pub fn unresolvable(mut self, host: &str) -> Self {
        self.unresolvable.insert(host.to_string());
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        self.responses.insert(
            url.to_string(),
            FetchOutcome::Response(FetchedResponse::new(status)),
        );
        self
    }

    pub fn redirect(mut self, url: &str, location: &str) -> Self {
        let mut response = FetchedResponse::new(StatusCode::MOVED_PERMANENTLY);
        response
            .headers
            .insert(LOCATION, HeaderValue::from_str(location).unwrap());
        self.responses
            .insert(url.to_string(), FetchOutcome::Response(response));
        self
    }

    pub fn outcome(mut self, url: &str, outcome: FetchOutcome) -> Self {
        self.responses.insert(url.to_string(), outcome);
        self
    }
}

#[async_trait]
impl WebBackend for StaticBackend {
    async fn resolve_host(&self, hostname: &str) -> bool {
        !self.unresolvable.contains(hostname)
    }

    async fn fetch(&self, url: &Url, _downloadable: &[String]) -> FetchOutcome {
        self.fetched.lock().push(url.to_string());
        self.responses
            .get(url.as_str())
            .cloned()
            .unwrap_or_else(|| FetchOutcome::Response(FetchedResponse::new(StatusCode::NOT_FOUND)))
    }
}
