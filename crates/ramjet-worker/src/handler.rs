//! Network request handler.
//!
//! Decides which requests belong to the proxy, fetches the decoded target
//! through the configured [`Transport`], and rewrites the response by
//! request destination before handing it back.

use std::sync::Arc;

use hyper::body::Bytes;
use ramjet_core::{ContentRewriter, PrefixCodec, RamjetConfig, StandardRewriter, UrlCodec};
use tracing::{debug, error};
use url::Url;

use crate::disposition;
use crate::error::{Result, WorkerError};
use crate::error_page;
use crate::request::{Credentials, Destination, ProxyRequest, ProxyResponse, RequestMode};
use crate::transport::{FetchInit, Transport};

/// Query parameter that asks for a redirect to the encoded form of a URL.
pub const URL_PARAM: &str = "url";

/// Handler configuration.
#[derive(Clone)]
pub struct HandlerConfig {
    /// Deployment configuration.
    pub config: RamjetConfig,
    /// Codec used to decode targets and encode redirects.
    pub codec: Arc<dyn UrlCodec>,
    /// Rewriter applied to response bodies and headers.
    pub rewriter: Arc<dyn ContentRewriter>,
    /// Upstream transport.
    pub transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for HandlerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerConfig")
            .field("config", &self.config)
            .field("codec", &"UrlCodec")
            .field("rewriter", &"ContentRewriter")
            .field("transport", &"Transport")
            .finish()
    }
}

impl HandlerConfig {
    /// Creates a configuration with the default codec and rewriter for
    /// `config`.
    pub fn new(config: RamjetConfig, transport: Arc<dyn Transport>) -> Self {
        let codec: Arc<dyn UrlCodec> = Arc::new(PrefixCodec::from_config(&config));
        let rewriter = Arc::new(StandardRewriter::new(codec.clone()));
        Self {
            config,
            codec,
            rewriter,
            transport,
        }
    }

    /// Sets the codec.
    pub fn with_codec(mut self, codec: Arc<dyn UrlCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the rewriter.
    pub fn with_rewriter(mut self, rewriter: Arc<dyn ContentRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }
}

/// Handles requests addressed to the proxy.
#[derive(Clone, Debug)]
pub struct RequestHandler {
    config: HandlerConfig,
    base: String,
}

impl RequestHandler {
    /// Creates a handler with the given configuration.
    pub fn new(config: HandlerConfig) -> Self {
        let base = config.config.proxy_base();
        Self { config, base }
    }

    /// Returns the deployment configuration.
    pub fn config(&self) -> &RamjetConfig {
        &self.config.config
    }

    /// Returns the codec.
    pub fn codec(&self) -> &Arc<dyn UrlCodec> {
        &self.config.codec
    }

    /// Returns true if the request is addressed to the proxy, that is its URL
    /// starts with `origin + prefix`.
    pub fn route(&self, request: &ProxyRequest) -> bool {
        request.url.starts_with(&self.base)
    }

    /// Routes and fetches. Returns `None` for requests outside the proxy.
    pub async fn handle(&self, request: ProxyRequest) -> Option<ProxyResponse> {
        if !self.route(&request) {
            return None;
        }
        Some(self.fetch(request).await)
    }

    /// Fetches a proxied request and rewrites the response.
    ///
    /// Never fails: errors become an error page for page navigations and an
    /// empty `500` for everything else.
    pub async fn fetch(&self, request: ProxyRequest) -> ProxyResponse {
        let result = match url_param(&request.url) {
            Some(target) => self.redirect_to(&target),
            None => self.fetch_upstream(&request).await,
        };
        result.unwrap_or_else(|e| self.failure(&request, e))
    }

    /// Answers the `url` escape hatch with a redirect to the encoded URL.
    fn redirect_to(&self, target: &str) -> Result<ProxyResponse> {
        let parsed = Url::parse(target).map_err(|e| WorkerError::invalid_url(target, e))?;
        let location = self.config.codec.encode(parsed.as_str());
        debug!("Redirecting {} to {}", target, location);
        Ok(ProxyResponse::redirect(location))
    }

    async fn fetch_upstream(&self, request: &ProxyRequest) -> Result<ProxyResponse> {
        let decoded = self.config.codec.decode(&request.url);
        let url = Url::parse(&decoded).map_err(|e| WorkerError::invalid_url(&decoded, e))?;

        let init = FetchInit {
            method: request.method.clone(),
            headers: request.headers.clone(),
            body: request.body.clone(),
            credentials: Credentials::Omit,
            mode: match request.mode {
                RequestMode::Cors => RequestMode::Cors,
                _ => RequestMode::SameOrigin,
            },
            cache: request.cache,
            redirect: request.redirect,
        };

        debug!("Fetching {} for {} destination", url, request.destination);
        let response = self.config.transport.fetch(&url, init).await?;

        let mut headers = self.config.rewriter.rewrite_headers(&response.raw_headers, &url);
        let body = match response.body {
            Some(body) => self.rewrite_body(&request.destination, body, &url),
            None => Bytes::new(),
        };

        if request.destination.is_document() {
            let final_url = Url::parse(&response.final_url).unwrap_or_else(|_| url.clone());
            let value = disposition::normalize(headers.get("content-disposition"), &final_url);
            headers.insert("content-disposition", value);
        }
        if headers.get("accept") == Some("text/event-stream") {
            headers.insert("content-type", "text/event-stream");
        }
        if self.config.config.cross_origin_isolated {
            headers.insert("cross-origin-embedder-policy", "require-corp");
        }

        Ok(ProxyResponse {
            status: response.status,
            status_text: response.status_text,
            headers,
            body,
        })
    }

    /// Picks the rewriter by destination alone.
    fn rewrite_body(&self, destination: &Destination, body: Bytes, base: &Url) -> Bytes {
        let rewriter = &self.config.rewriter;
        let rewritten = match destination {
            Destination::Document | Destination::Iframe => {
                rewriter.rewrite_html(&String::from_utf8_lossy(&body), base)
            }
            Destination::Script => rewriter.rewrite_js(&String::from_utf8_lossy(&body), base),
            Destination::Style => rewriter.rewrite_css(&String::from_utf8_lossy(&body), base),
            _ => return body,
        };
        Bytes::from(rewritten)
    }

    fn failure(&self, request: &ProxyRequest, e: WorkerError) -> ProxyResponse {
        error!(
            destination = %request.destination,
            "Failed to fetch {}: {}",
            request.url,
            e
        );
        if !request.destination.is_document() {
            return ProxyResponse::empty(500);
        }

        let fetched_url = self.config.codec.decode(&request.url);
        let hostname = self.config.config.hostname().unwrap_or_default();
        let page = error_page::render(&e.to_string(), &fetched_url, &hostname);

        let mut response = ProxyResponse::empty(500);
        response.status_text = "Internal Server Error".to_string();
        response.headers.insert("content-type", "text/html");
        if self.config.config.cross_origin_isolated {
            response
                .headers
                .insert("cross-origin-embedder-policy", "require-corp");
        }
        response.body = Bytes::from(page);
        response
    }
}

/// Returns the `url` query parameter of a request URL, if present.
fn url_param(request_url: &str) -> Option<String> {
    let parsed = Url::parse(request_url).ok()?;
    parsed
        .query_pairs()
        .find(|(name, _)| name == URL_PARAM)
        .map(|(_, value)| value.into_owned())
}
