//! Content rewriter boundary.
//!
//! Rewriters are pure transforms keyed by content kind. They must leave every
//! byte that is not a URL reference untouched. The network layer picks the
//! rewriter by request destination; the interception layer reuses the CSS and
//! header rewriters for values produced at runtime.
//!
//! [`StandardRewriter`] covers the URL-bearing constructs that do not need a
//! parser: HTML attributes, `srcset`, inline and block styles, CSS `url()` and
//! `@import`, and URL-valued response headers. Script text is left unchanged;
//! a script-aware rewriter can be plugged in through [`ContentRewriter`].

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use url::Url;

use crate::codec::{encode_relative, UrlCodec};
use crate::headers::RawHeaders;

/// Rewrites fetched content so its URL references route through the proxy.
pub trait ContentRewriter: Send + Sync {
    /// Rewrites an HTML document fetched from `base`.
    fn rewrite_html(&self, body: &str, base: &Url) -> String;

    /// Rewrites a stylesheet fetched from `base`.
    fn rewrite_css(&self, body: &str, base: &Url) -> String;

    /// Rewrites a script fetched from `base`.
    fn rewrite_js(&self, body: &str, base: &Url) -> String;

    /// Rewrites a header map belonging to a response from `base`.
    fn rewrite_headers(&self, headers: &RawHeaders, base: &Url) -> RawHeaders;
}

/// Attributes whose whole value is a single URL.
static URL_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(\s(?:src|href|action|formaction|poster|ping|data-src|background)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#,
    )
    .expect("valid URL attribute pattern")
});

static SRCSET_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\s(?:srcset|imagesrcset)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid srcset pattern")
});

static STYLE_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(\sstyle\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).expect("valid style pattern")
});

static STYLE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)(<style\b[^>]*>)(.*?)(</style\s*>)").expect("valid style block pattern")
});

static INTEGRITY_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\sintegrity\s*=\s*(?:"[^"]*"|'[^']*')"#).expect("valid integrity pattern")
});

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#)
        .expect("valid css url pattern")
});

static CSS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(@import\s+)(?:"([^"]*)"|'([^']*)')"#).expect("valid import pattern")
});

static REFRESH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\s*\d+\s*[;,]\s*url\s*=\s*)(.*)$").expect("valid refresh pattern")
});

/// Response headers that would stop proxied content from loading.
const DROPPED_HEADERS: &[&str] = &[
    "content-security-policy",
    "content-security-policy-report-only",
    "x-content-security-policy",
    "x-webkit-csp",
    "cross-origin-opener-policy",
    "cross-origin-embedder-policy",
    "cross-origin-resource-policy",
    "x-frame-options",
    "permissions-policy",
    "strict-transport-security",
    "clear-site-data",
    "timing-allow-origin",
];

/// Response headers whose value is a single URL.
const URL_HEADERS: &[&str] = &["location", "content-location"];

/// Default rewriter backed by a [`UrlCodec`].
#[derive(Clone)]
pub struct StandardRewriter {
    codec: Arc<dyn UrlCodec>,
}

impl std::fmt::Debug for StandardRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardRewriter")
            .field("codec", &"UrlCodec")
            .finish()
    }
}

impl StandardRewriter {
    /// Creates a rewriter that encodes URLs with `codec`.
    pub fn new(codec: Arc<dyn UrlCodec>) -> Self {
        Self { codec }
    }

    fn encode(&self, raw: &str, base: &Url) -> String {
        encode_relative(self.codec.as_ref(), raw, Some(base))
    }

    fn rewrite_srcset(&self, srcset: &str, base: &Url) -> String {
        srcset
            .split(',')
            .map(|candidate| {
                let trimmed = candidate.trim();
                match trimmed.split_once(char::is_whitespace) {
                    Some((url, descriptor)) => {
                        format!("{} {}", self.encode(url, base), descriptor.trim())
                    }
                    None if trimmed.is_empty() => String::new(),
                    None => self.encode(trimmed, base),
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Returns the quoted value captured by a `(prefix)("a"|'b')` pattern together
/// with its quote character.
fn quoted<'a>(caps: &Captures<'a>) -> (&'a str, char) {
    match (caps.get(2), caps.get(3)) {
        (Some(m), _) => (m.as_str(), '"'),
        (None, Some(m)) => (m.as_str(), '\''),
        (None, None) => ("", '"'),
    }
}

impl ContentRewriter for StandardRewriter {
    fn rewrite_html(&self, body: &str, base: &Url) -> String {
        let out = STYLE_BLOCK.replace_all(body, |caps: &Captures| {
            format!("{}{}{}", &caps[1], self.rewrite_css(&caps[2], base), &caps[3])
        });
        let out = URL_ATTR.replace_all(&out, |caps: &Captures| {
            let (value, q) = quoted(caps);
            format!("{}{q}{}{q}", &caps[1], self.encode(value, base))
        });
        let out = SRCSET_ATTR.replace_all(&out, |caps: &Captures| {
            let (value, q) = quoted(caps);
            format!("{}{q}{}{q}", &caps[1], self.rewrite_srcset(value, base))
        });
        let out = STYLE_ATTR.replace_all(&out, |caps: &Captures| {
            let (value, q) = quoted(caps);
            format!("{}{q}{}{q}", &caps[1], self.rewrite_css(value, base))
        });
        INTEGRITY_ATTR.replace_all(&out, "").into_owned()
    }

    fn rewrite_css(&self, body: &str, base: &Url) -> String {
        let out = CSS_URL.replace_all(body, |caps: &Captures| {
            let (value, quote) = match (caps.get(1), caps.get(2), caps.get(3)) {
                (Some(m), _, _) => (m.as_str(), "\""),
                (_, Some(m), _) => (m.as_str(), "'"),
                (_, _, Some(m)) => (m.as_str(), ""),
                _ => ("", ""),
            };
            format!("url({quote}{}{quote})", self.encode(value, base))
        });
        CSS_IMPORT
            .replace_all(&out, |caps: &Captures| {
                let (value, q) = quoted(caps);
                format!("{}{q}{}{q}", &caps[1], self.encode(value, base))
            })
            .into_owned()
    }

    fn rewrite_js(&self, body: &str, _base: &Url) -> String {
        body.to_string()
    }

    fn rewrite_headers(&self, headers: &RawHeaders, base: &Url) -> RawHeaders {
        let mut out = RawHeaders::new();
        for (name, value) in headers.iter() {
            if DROPPED_HEADERS.contains(&name) {
                continue;
            }
            if URL_HEADERS.contains(&name) {
                out.insert(name, self.encode(value, base));
            } else if name == "refresh" {
                let rewritten = REFRESH.replace(value, |caps: &Captures| {
                    let target = caps[2].trim().trim_matches(['"', '\'']);
                    format!("{}{}", &caps[1], self.encode(target, base))
                });
                out.insert(name, rewritten.into_owned());
            } else {
                out.append(name, value);
            }
        }
        out
    }
}
