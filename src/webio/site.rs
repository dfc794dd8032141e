use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION},
    HeaderMap, StatusCode, Version,
};
use std::{
    fmt,
    hash::{Hash, Hasher},
};
use url::{Host, Url};

use crate::error::XrefError;

/// An absolute url together with its cache key: the url without its fragment, lower cased.
///
/// Two `CleanUrl`s compare equal when their keys do, so `http://x.test/Page#a` and
/// `http://x.test/page#b` share one cache slot.
#[derive(Clone)]
pub struct CleanUrl {
    url: Url,
    key: String,
}

impl CleanUrl {
    pub fn parse(input: &str) -> Result<Self, XrefError> {
        Ok(CleanUrl::new(Url::parse(input)?))
    }

    pub fn new(url: Url) -> Self {
        let mut without_fragment = url.clone();
        without_fragment.set_fragment(None);
        CleanUrl {
            key: without_fragment.as_str().to_lowercase(),
            url,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn without_fragment(&self) -> Url {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url
    }

    /// Original casing, fragment removed. This is the form used in warning messages.
    pub fn absolute_url_without_fragment(&self) -> String {
        self.without_fragment().to_string()
    }

    /// Lower cased host name, if the url has one.
    pub fn host_key(&self) -> Option<String> {
        self.url.host_str().map(|host| host.to_lowercase())
    }

    pub fn host_is_ip(&self) -> bool {
        matches!(self.url.host(), Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)))
    }
}

impl PartialEq for CleanUrl {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for CleanUrl {}

impl Hash for CleanUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for CleanUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CleanUrl({})", self.url)
    }
}

impl fmt::Display for CleanUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// Raw outcome of one non-redirect-following GET, as reported by a [`super::WebBackend`].
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Response(FetchedResponse),
    TimedOut,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub version: Version,
    pub headers: HeaderMap,
    /// Only present when the content type was registered as downloadable for the host
    pub body: Option<Vec<u8>>,
}

impl FetchedResponse {
    pub fn new(status: StatusCode) -> Self {
        FetchedResponse {
            status,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// Whether a response with these headers matches one of the `downloadable` content-type prefixes.
pub fn wants_body(headers: &HeaderMap, downloadable: &[String]) -> bool {
    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let content_type = content_type.to_ascii_lowercase();
    downloadable
        .iter()
        .any(|prefix| content_type.starts_with(&prefix.to_ascii_lowercase()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteContent {
    Text(String),
    Bytes(Vec<u8>),
}

/// Cached outcome of fetching one url. Never changes once stored in the controller's cache.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub url: CleanUrl,
    pub request_timed_out: bool,
    pub request_failed: bool,
    pub failure: Option<String>,
    pub status: Option<StatusCode>,
    pub http_version: Option<Version>,
    pub is_redirect: bool,
    pub redirect_target: Option<CleanUrl>,
    pub headers: HeaderMap,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub content: Option<SiteContent>,
}

impl SiteInfo {
    fn empty(url: CleanUrl) -> Self {
        SiteInfo {
            url,
            request_timed_out: false,
            request_failed: false,
            failure: None,
            status: None,
            http_version: None,
            is_redirect: false,
            redirect_target: None,
            headers: HeaderMap::new(),
            content_type: None,
            content_length: None,
            content: None,
        }
    }

    pub fn failed(url: CleanUrl, reason: impl Into<String>) -> Self {
        SiteInfo {
            request_failed: true,
            failure: Some(reason.into()),
            ..SiteInfo::empty(url)
        }
    }

    pub fn from_outcome(url: CleanUrl, outcome: FetchOutcome) -> Self {
        match outcome {
            FetchOutcome::TimedOut => SiteInfo {
                request_timed_out: true,
                ..SiteInfo::empty(url)
            },
            FetchOutcome::Failed(reason) => SiteInfo::failed(url, reason),
            FetchOutcome::Response(response) => SiteInfo::from_response(url, response),
        }
    }

    fn from_response(url: CleanUrl, response: FetchedResponse) -> Self {
        let mut info = SiteInfo::empty(url);
        let FetchedResponse {
            status,
            version,
            headers,
            body,
        } = response;

        info.status = Some(status);
        info.http_version = Some(version);
        info.content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        info.content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());

        if status.is_redirection() {
            info.redirect_target = headers
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| info.url.url().join(location).ok())
                .map(CleanUrl::new);
            info.is_redirect = info.redirect_target.is_some();
        }

        info.content = body.map(|bytes| {
            let is_text = info
                .content_type
                .as_deref()
                .map(|ct| {
                    let ct = ct.to_ascii_lowercase();
                    ct.starts_with("text/") || ct.contains("json") || ct.contains("xml")
                })
                .unwrap_or(false);
            match (is_text, String::from_utf8(bytes)) {
                (true, Ok(text)) => SiteContent::Text(text),
                (_, Ok(text)) => SiteContent::Bytes(text.into_bytes()),
                (_, Err(e)) => SiteContent::Bytes(e.into_bytes()),
            }
        });
        info.headers = headers;
        info
    }

    pub fn is_2xx(&self) -> bool {
        self.status.map(|s| s.is_success()).unwrap_or(false)
    }

    pub fn status_code(&self) -> u16 {
        self.status.map(|s| s.as_u16()).unwrap_or(0)
    }
}
