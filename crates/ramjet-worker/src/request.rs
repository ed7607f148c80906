//! Fetch exchange types.
//!
//! A [`ProxyRequest`] is the network layer's view of one outgoing request
//! from a proxied page. The enums mirror the request attributes a browser
//! exposes and are parsed from their wire spellings (`sec-fetch-dest`,
//! `sec-fetch-mode`, ...). Unknown spellings are kept verbatim rather than
//! guessed.

use std::fmt;
use std::str::FromStr;

use hyper::body::Bytes;
use ramjet_core::RawHeaders;

/// The kind of resource a request is for.
///
/// Only the destination decides how a response body is rewritten; content
/// sniffing never overrides it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Destination {
    Document,
    Iframe,
    Frame,
    Script,
    Style,
    Worker,
    SharedWorker,
    ServiceWorker,
    Image,
    Font,
    Audio,
    Video,
    Track,
    Manifest,
    Object,
    Embed,
    Report,
    /// `fetch()`/XHR and other requests with no destination.
    #[default]
    Empty,
    Other(String),
}

impl Destination {
    /// Returns the wire spelling.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Document => "document",
            Self::Iframe => "iframe",
            Self::Frame => "frame",
            Self::Script => "script",
            Self::Style => "style",
            Self::Worker => "worker",
            Self::SharedWorker => "sharedworker",
            Self::ServiceWorker => "serviceworker",
            Self::Image => "image",
            Self::Font => "font",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Track => "track",
            Self::Manifest => "manifest",
            Self::Object => "object",
            Self::Embed => "embed",
            Self::Report => "report",
            Self::Empty => "",
            Self::Other(other) => other,
        }
    }

    /// Returns true for navigations that render as a page: documents and
    /// iframes.
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document | Self::Iframe)
    }
}

impl FromStr for Destination {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Ok(match lower.as_str() {
            "document" => Self::Document,
            "iframe" => Self::Iframe,
            "frame" => Self::Frame,
            "script" => Self::Script,
            "style" => Self::Style,
            "worker" => Self::Worker,
            "sharedworker" => Self::SharedWorker,
            "serviceworker" => Self::ServiceWorker,
            "image" => Self::Image,
            "font" => Self::Font,
            "audio" => Self::Audio,
            "video" => Self::Video,
            "track" => Self::Track,
            "manifest" => Self::Manifest,
            "object" => Self::Object,
            "embed" => Self::Embed,
            "report" => Self::Report,
            "" | "empty" => Self::Empty,
            _ => Self::Other(lower),
        })
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    Cors,
    NoCors,
    SameOrigin,
    Navigate,
    Websocket,
}

impl FromStr for RequestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cors" => Ok(Self::Cors),
            "no-cors" => Ok(Self::NoCors),
            "same-origin" => Ok(Self::SameOrigin),
            "navigate" => Ok(Self::Navigate),
            "websocket" => Ok(Self::Websocket),
            other => Err(format!("unknown request mode: {}", other)),
        }
    }
}

/// Credentials mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

impl FromStr for Credentials {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "omit" => Ok(Self::Omit),
            "same-origin" => Ok(Self::SameOrigin),
            "include" => Ok(Self::Include),
            other => Err(format!("unknown credentials mode: {}", other)),
        }
    }
}

/// Cache mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

impl CacheMode {
    /// Derives the cache mode from a request `cache-control` header.
    pub fn from_cache_control(value: &str) -> Self {
        let directives: Vec<String> = value
            .split(',')
            .map(|d| d.trim().to_ascii_lowercase())
            .collect();
        if directives.iter().any(|d| d == "no-store") {
            Self::NoStore
        } else if directives.iter().any(|d| d == "no-cache" || d == "max-age=0") {
            Self::NoCache
        } else {
            Self::Default
        }
    }
}

impl FromStr for CacheMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "no-store" => Ok(Self::NoStore),
            "reload" => Ok(Self::Reload),
            "no-cache" => Ok(Self::NoCache),
            "force-cache" => Ok(Self::ForceCache),
            "only-if-cached" => Ok(Self::OnlyIfCached),
            other => Err(format!("unknown cache mode: {}", other)),
        }
    }
}

/// Redirect mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RedirectMode {
    #[default]
    Follow,
    Error,
    Manual,
}

impl FromStr for RedirectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "follow" => Ok(Self::Follow),
            "error" => Ok(Self::Error),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown redirect mode: {}", other)),
        }
    }
}

/// An outgoing request from a proxied page.
#[derive(Debug, Clone, Default)]
pub struct ProxyRequest {
    /// The proxied (encoded) URL.
    pub url: String,
    pub method: String,
    pub headers: RawHeaders,
    pub body: Option<Bytes>,
    pub mode: RequestMode,
    pub credentials: Credentials,
    pub cache: CacheMode,
    pub redirect: RedirectMode,
    pub destination: Destination,
}

impl ProxyRequest {
    /// Creates a `GET` request for `url` with default attributes.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            ..Self::default()
        }
    }

    /// Sets the destination.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Sets the request mode.
    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the method.
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    /// Sets a request header.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// The handler's answer to a [`ProxyRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub status_text: String,
    pub headers: RawHeaders,
    pub body: Bytes,
}

impl ProxyResponse {
    /// A `302 Found` pointing at `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        let mut headers = RawHeaders::new();
        headers.insert("location", location);
        Self {
            status: 302,
            status_text: "Found".to_string(),
            headers,
            body: Bytes::new(),
        }
    }

    /// A response with no headers and no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: RawHeaders::new(),
            body: Bytes::new(),
        }
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_parses_wire_spelling() {
        assert_eq!("document".parse::<Destination>().unwrap(), Destination::Document);
        assert_eq!("IFrame".parse::<Destination>().unwrap(), Destination::Iframe);
        assert_eq!("sharedworker".parse::<Destination>().unwrap(), Destination::SharedWorker);
        assert_eq!("".parse::<Destination>().unwrap(), Destination::Empty);
        assert_eq!(
            "xslt".parse::<Destination>().unwrap(),
            Destination::Other("xslt".to_string())
        );
    }

    #[test]
    fn destination_display_round_trips() {
        for raw in ["document", "script", "style", "serviceworker", "xslt"] {
            let parsed: Destination = raw.parse().unwrap();
            assert_eq!(parsed.to_string(), raw);
        }
    }

    #[test]
    fn only_pages_are_documents() {
        assert!(Destination::Document.is_document());
        assert!(Destination::Iframe.is_document());
        assert!(!Destination::Frame.is_document());
        assert!(!Destination::Script.is_document());
    }

    #[test]
    fn cache_mode_from_cache_control() {
        assert_eq!(CacheMode::from_cache_control("no-store"), CacheMode::NoStore);
        assert_eq!(CacheMode::from_cache_control("max-age=0"), CacheMode::NoCache);
        assert_eq!(CacheMode::from_cache_control("No-Cache, private"), CacheMode::NoCache);
        assert_eq!(CacheMode::from_cache_control("max-age=60"), CacheMode::Default);
    }

    #[test]
    fn unknown_modes_are_rejected() {
        assert!("navigate".parse::<RequestMode>().is_ok());
        assert!("bogus".parse::<RequestMode>().is_err());
        assert!("bogus".parse::<RedirectMode>().is_err());
    }

    #[test]
    fn redirect_response_carries_location() {
        let response = ProxyResponse::redirect("https://proxy.test/ramjet/x");
        assert_eq!(response.status, 302);
        assert_eq!(response.headers.get("Location"), Some("https://proxy.test/ramjet/x"));
        assert!(response.body.is_empty());
    }
}
