//! Validator configuration.
//!
//! A [`Config`] is plain serde data, loadable from TOML. The runtime pieces derived from it (the
//! parser registry and the web IO controller) live in a [`Pipeline`] that each validation context
//! builds once.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{read_to_string, write},
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use crate::{
    error::XrefError,
    parsing::ParsingController,
    paths::PathHelper,
    webio::{WebBackend, WebIoController},
};

pub const MAX_REQUEST_CONCURRENCY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub root_directory: PathBuf,
    pub parsing: ParsingConfig,
    pub web_io: WebIoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            root_directory: PathBuf::from("."),
            parsing: ParsingConfig::default(),
            web_io: WebIoConfig::default(),
        }
    }
}

impl Config {
    pub fn new<P: AsRef<Path>>(root_directory: P) -> Self {
        Config {
            root_directory: root_directory.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, XrefError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, XrefError> {
        tracing::debug!("[Config] Reading {:?}", path.as_ref());
        let content = read_to_string(path)?;
        Config::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, XrefError> {
        Ok(toml::to_string(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), XrefError> {
        Ok(write(path, self.to_toml_string()?)?)
    }

    pub fn validate(&self) -> Result<(), XrefError> {
        if self.root_directory.as_os_str().is_empty() {
            return Err(XrefError::InvalidConfig(
                "root_directory must not be empty".to_string(),
            ));
        }
        if let Some(proxy) = &self.web_io.proxy {
            url::Url::parse(proxy).map_err(|e| {
                XrefError::InvalidConfig(format!("proxy `{proxy}` is not a valid url: {e}"))
            })?;
        }
        Ok(())
    }

    pub fn path_helper(&self) -> PathHelper {
        PathHelper::new(&self.root_directory)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Files with at least this many lines get a `HugeMarkdownFile` suggestion
    pub huge_file_line_count: usize,
    pub warn_on_empty_file: bool,
    /// Extensions (without the dot) the CLI treats as markdown
    pub markdown_extensions: Vec<String>,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        ParsingConfig {
            huge_file_line_count: 1500,
            warn_on_empty_file: true,
            markdown_extensions: vec!["md".to_string(), "markdown".to_string()],
        }
    }
}

impl ParsingConfig {
    pub fn is_markdown_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.markdown_extensions
                    .iter()
                    .any(|md| md.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebIoConfig {
    pub enabled: bool,
    pub maximum_request_concurrency: usize,
    pub maximum_redirect_count: usize,
    /// `None` disables the timeout
    pub request_timeout_ms: Option<u64>,
    pub proxy: Option<String>,
    pub user_agent: String,
    /// Hostname -> content-type prefixes whose bodies are worth keeping in the site cache
    pub downloadable_content: BTreeMap<String, Vec<String>>,
}

impl Default for WebIoConfig {
    fn default() -> Self {
        WebIoConfig {
            enabled: true,
            maximum_request_concurrency: 16,
            maximum_redirect_count: 4,
            request_timeout_ms: Some(10_000),
            proxy: None,
            user_agent: format!("xref-core/{}", env!("CARGO_PKG_VERSION")),
            downloadable_content: BTreeMap::new(),
        }
    }
}

impl WebIoConfig {
    /// Concurrency budget, clamped to `1..=MAX_REQUEST_CONCURRENCY`.
    pub fn concurrency(&self) -> usize {
        self.maximum_request_concurrency
            .clamp(1, MAX_REQUEST_CONCURRENCY)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Runtime objects shared by everything parsed within one validation context.
pub struct Pipeline {
    pub config: Config,
    pub path_helper: PathHelper,
    pub parsers: ParsingController,
    pub web_io: Arc<WebIoController>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self, XrefError> {
        config.validate()?;
        let web_io = Arc::new(WebIoController::new(&config.web_io)?);
        Ok(Pipeline::from_parts(config, web_io))
    }

    /// Build a pipeline whose network access goes through `backend`.
    pub fn with_backend(config: Config, backend: Arc<dyn WebBackend>) -> Result<Self, XrefError> {
        config.validate()?;
        let web_io = Arc::new(WebIoController::with_backend(&config.web_io, backend)?);
        Ok(Pipeline::from_parts(config, web_io))
    }

    fn from_parts(config: Config, web_io: Arc<WebIoController>) -> Self {
        Pipeline {
            path_helper: config.path_helper(),
            parsers: ParsingController::with_default_parsers(),
            config,
            web_io,
        }
    }
}
