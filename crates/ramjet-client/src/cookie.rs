//! Per-context cookie store.
//!
//! Cookies are keyed by the real (decoded) site, not the proxy origin, so
//! `document.cookie` on a proxied page sees what the real site would.

use std::collections::BTreeMap;

use tracing::debug;
use url::Url;

/// One stored cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Domain without a leading dot.
    pub domain: String,
    pub path: String,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        domain_matches(host, &self.domain)
            && url.path().starts_with(self.path.as_str())
            && (!self.secure || url.scheme() == "https")
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host.eq_ignore_ascii_case(domain)
        || host
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
}

/// Cookie jar for one browsing context.
#[derive(Debug, Clone, Default)]
pub struct CookieStore {
    cookies: BTreeMap<(String, String, String), Cookie>,
}

impl CookieStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a serialized `name=value; name2=value2` list for `url`'s host.
    pub fn load(&mut self, serialized: &str, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };
        for pair in serialized.split(';') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            self.store(Cookie {
                name: name.to_string(),
                value: value.trim().to_string(),
                domain: host.to_string(),
                path: "/".to_string(),
                secure: false,
                http_only: false,
            });
        }
    }

    /// Applies a `Set-Cookie` header value received for `url`.
    ///
    /// Returns false if the cookie was rejected.
    pub fn set_cookie(&mut self, header: &str, url: &Url) -> bool {
        let mut parts = header.split(';');
        let Some((name, value)) = parts.next().and_then(|p| p.split_once('=')) else {
            debug!("Ignoring malformed cookie '{}'", header);
            return false;
        };
        let Some(host) = url.host_str() else {
            return false;
        };

        let mut cookie = Cookie {
            name: name.trim().to_string(),
            value: value.trim().to_string(),
            domain: host.to_ascii_lowercase(),
            path: default_path(url),
            secure: false,
            http_only: false,
        };
        if cookie.name.is_empty() {
            return false;
        }
        let mut expired = false;

        for attribute in parts {
            let (key, val) = attribute
                .split_once('=')
                .map(|(k, v)| (k.trim(), v.trim()))
                .unwrap_or((attribute.trim(), ""));
            match key.to_ascii_lowercase().as_str() {
                "domain" => {
                    let domain = val.trim_start_matches('.').to_ascii_lowercase();
                    if !domain_matches(host, &domain) {
                        debug!("Rejecting cookie '{}' for foreign domain '{}'", cookie.name, domain);
                        return false;
                    }
                    cookie.domain = domain;
                }
                "path" if val.starts_with('/') => cookie.path = val.to_string(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "max-age" => expired = val.parse::<i64>().map(|age| age <= 0).unwrap_or(false),
                _ => {}
            }
        }

        if expired {
            self.cookies.remove(&key_of(&cookie));
        } else {
            self.store(cookie);
        }
        true
    }

    /// Applies an assignment to `document.cookie`. Scripts cannot create
    /// `HttpOnly` cookies.
    pub fn set_document_cookie(&mut self, value: &str, url: &Url) -> bool {
        let http_only = value
            .split(';')
            .skip(1)
            .any(|attr| attr.trim().eq_ignore_ascii_case("httponly"));
        if http_only {
            return false;
        }
        self.set_cookie(value, url)
    }

    /// Returns the `Cookie` request header value for `url`.
    pub fn cookie_header(&self, url: &Url) -> String {
        self.serialize(url, true)
    }

    /// Returns what `document.cookie` reads for `url`.
    pub fn document_cookie(&self, url: &Url) -> String {
        self.serialize(url, false)
    }

    /// Number of stored cookies.
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    fn store(&mut self, cookie: Cookie) {
        self.cookies.insert(key_of(&cookie), cookie);
    }

    fn serialize(&self, url: &Url, include_http_only: bool) -> String {
        self.cookies
            .values()
            .filter(|c| c.matches(url) && (include_http_only || !c.http_only))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn key_of(cookie: &Cookie) -> (String, String, String) {
    (cookie.domain.clone(), cookie.path.clone(), cookie.name.clone())
}

fn default_path(url: &Url) -> String {
    match url.path().rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => url.path()[..i].to_string(),
    }
}
