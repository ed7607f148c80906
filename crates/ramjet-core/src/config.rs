//! Proxy configuration.
//!
//! One [`RamjetConfig`] describes a deployment: the origin pages are served
//! from, the path prefix under which proxied URLs live, and the path of the
//! interception layer's own script (used to tell internal stack frames apart
//! from page frames).

use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, Result};

/// Default path prefix for proxied URLs.
pub const DEFAULT_PREFIX: &str = "/ramjet/";

/// Default location of the interception layer's own scripts.
pub const DEFAULT_INTERNAL_PATH: &str = "/ramjet.internal/";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8770;

/// Default cap on request and response bodies, in bytes.
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Smallest accepted body cap.
const MIN_BODY_SIZE: usize = 1024;

/// Name of the global function rewritten scripts call to obtain wrapped
/// document/location/global references.
pub const WRAP_FN: &str = "$ramjet$wrap";

/// Key carrying the message kind on messages posted to the controlling worker.
pub const MESSAGE_TYPE_KEY: &str = "ramjet$type";

/// Message kind announcing an emulated service worker registration.
pub const REGISTER_SERVICE_WORKER: &str = "registerServiceWorker";

/// Deployment configuration shared by client and worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RamjetConfig {
    /// Origin the proxy is served from (scheme, host and optional port).
    pub origin: String,
    /// Path prefix for proxied URLs. Starts and ends with `/`.
    pub prefix: String,
    /// Path prefix of the interception layer's own scripts.
    pub internal_path: String,
    /// Whether the embedding context is cross-origin isolated.
    pub cross_origin_isolated: bool,
    /// Address the server binds to.
    pub bind_addr: IpAddr,
    /// Port the server binds to.
    pub port: u16,
    /// Largest request or upstream response body the worker buffers.
    pub max_body_size: usize,
}

impl Default for RamjetConfig {
    fn default() -> Self {
        Self {
            origin: format!("http://127.0.0.1:{}", DEFAULT_PORT),
            prefix: DEFAULT_PREFIX.to_string(),
            internal_path: DEFAULT_INTERNAL_PATH.to_string(),
            cross_origin_isolated: false,
            bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

impl RamjetConfig {
    /// Creates a configuration for the given origin with default paths.
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            ..Self::default()
        }
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    /// Loads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loaded configuration from {:?}", path.as_ref());
        Self::from_json(&contents)
    }

    /// Normalizes and checks the configuration.
    ///
    /// The origin must parse as an absolute URL without a path; the prefix
    /// and internal path are given leading and trailing slashes.
    pub fn validate(mut self) -> Result<Self> {
        let parsed = Url::parse(&self.origin)
            .map_err(|e| CoreError::invalid_url(self.origin.clone(), e))?;
        if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
            return Err(CoreError::Config(format!(
                "origin must not carry a path, query or fragment: {}",
                self.origin
            )));
        }
        self.origin = parsed.origin().ascii_serialization();
        self.prefix = normalize_path(&self.prefix);
        self.internal_path = normalize_path(&self.internal_path);
        if self.prefix == "/" {
            return Err(CoreError::Config("prefix must not be the root path".into()));
        }
        if self.max_body_size < MIN_BODY_SIZE {
            return Err(CoreError::Config(format!(
                "max_body_size must be at least {} bytes",
                MIN_BODY_SIZE
            )));
        }
        Ok(self)
    }

    /// Sets the origin.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the proxied URL prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Sets cross-origin isolation.
    pub fn with_cross_origin_isolated(mut self, isolated: bool) -> Self {
        self.cross_origin_isolated = isolated;
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the body size cap.
    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    /// Returns `origin + prefix`, the string every proxied URL starts with.
    pub fn proxy_base(&self) -> String {
        format!("{}{}", self.origin.trim_end_matches('/'), self.prefix)
    }

    /// Returns `origin + internal_path`, the location of internal scripts.
    pub fn internal_base(&self) -> String {
        format!("{}{}", self.origin.trim_end_matches('/'), self.internal_path)
    }

    /// Returns the host name of the origin, if any.
    pub fn hostname(&self) -> Option<String> {
        Url::parse(&self.origin)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
