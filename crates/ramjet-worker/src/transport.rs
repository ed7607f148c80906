//! Upstream fetch boundary.
//!
//! The handler never talks to the network directly. It hands a decoded URL
//! and a [`FetchInit`] to a [`Transport`] and gets back the raw response.
//! [`HttpTransport`] is the `reqwest`-backed implementation used by the
//! server; tests supply their own.

use std::time::Duration;

use async_trait::async_trait;
use hyper::body::Bytes;
use ramjet_core::{RawHeaders, DEFAULT_MAX_BODY_SIZE};
use tracing::debug;
use url::Url;

use crate::error::TransportError;
use crate::request::{CacheMode, Credentials, RedirectMode, RequestMode};

/// Default upstream request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of redirects followed in `follow` mode.
const MAX_REDIRECTS: usize = 10;

/// Request headers that only describe the hop to the proxy.
const HOP_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "content-length",
];

/// Options for one upstream fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchInit {
    pub method: String,
    pub headers: RawHeaders,
    pub body: Option<Bytes>,
    pub credentials: Credentials,
    pub mode: RequestMode,
    pub cache: CacheMode,
    pub redirect: RedirectMode,
}

/// The raw upstream response, before any rewriting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub status_text: String,
    pub raw_headers: RawHeaders,
    /// URL of the final response after redirects.
    pub final_url: String,
    /// `None` when the response has no body.
    pub body: Option<Bytes>,
}

/// Performs upstream fetches for the request handler.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches `url` with the given options.
    async fn fetch(&self, url: &Url, init: FetchInit) -> Result<TransportResponse, TransportError>;
}

/// `reqwest`-backed transport.
///
/// Keeps one client per redirect policy. No cookie store is attached, so
/// every fetch is made without ambient credentials.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    follow: reqwest::Client,
    manual: reqwest::Client,
    max_body_size: usize,
}

impl HttpTransport {
    /// Creates a transport with the default timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Creates a transport with the given request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let follow = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        let manual = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self {
            follow,
            manual,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        })
    }

    /// Caps how many response body bytes are buffered per fetch.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    fn client(&self, redirect: RedirectMode) -> &reqwest::Client {
        match redirect {
            RedirectMode::Follow => &self.follow,
            RedirectMode::Manual | RedirectMode::Error => &self.manual,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, init: FetchInit) -> Result<TransportResponse, TransportError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TransportError::UnsupportedScheme(url.scheme().to_string()));
        }
        let method = reqwest::Method::from_bytes(init.method.as_bytes())
            .map_err(|_| TransportError::InvalidMethod(init.method.clone()))?;

        let mut request = self.client(init.redirect).request(method, url.clone());
        for (name, value) in outgoing_headers(&init).iter() {
            request = request.header(name, value);
        }
        if let Some(body) = init.body {
            request = request.body(body);
        }

        debug!("Fetching {} ({:?} mode)", url, init.mode);
        let mut response = request.send().await?;

        let status = response.status();
        if init.redirect == RedirectMode::Error && status.is_redirection() {
            return Err(TransportError::Request(format!(
                "redirect from {} while redirect mode is error",
                url
            )));
        }

        let mut raw_headers = RawHeaders::new();
        for (name, value) in response.headers() {
            match value.to_str() {
                Ok(value) => raw_headers.append(name.as_str(), value),
                Err(_) => debug!("Dropping non-text response header {}", name),
            }
        }
        let final_url = response.url().to_string();
        let limit = self.max_body_size;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(TransportError::BodyTooLarge { limit });
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(TransportError::BodyTooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        let bytes = Bytes::from(body);

        Ok(TransportResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            raw_headers,
            final_url,
            body: (!bytes.is_empty()).then_some(bytes),
        })
    }
}

/// Builds the header set sent upstream.
///
/// Hop-by-hop headers are dropped. `accept-encoding` is dropped too so
/// bodies arrive uncompressed for the rewriters. With `omit` credentials the
/// page's cookie and authorization headers are not forwarded.
fn outgoing_headers(init: &FetchInit) -> RawHeaders {
    let mut headers = RawHeaders::new();
    for (name, value) in init.headers.iter() {
        if HOP_HEADERS.contains(&name) || name == "accept-encoding" {
            continue;
        }
        if init.credentials == Credentials::Omit && (name == "cookie" || name == "authorization") {
            continue;
        }
        headers.insert(name, value);
    }
    match init.cache {
        CacheMode::NoStore => headers.insert("cache-control", "no-store"),
        CacheMode::Reload | CacheMode::NoCache => headers.insert("cache-control", "no-cache"),
        CacheMode::Default | CacheMode::ForceCache | CacheMode::OnlyIfCached => {}
    }
    headers
}
