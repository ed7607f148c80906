//! URL codec boundary.
//!
//! The codec is a pair of pure string transforms between a real URL and its
//! proxied form. Both halves of the proxy consume it only through
//! [`UrlCodec`]; [`PrefixCodec`] is the default implementation.
//!
//! Invariant: for every valid absolute URL `u`,
//! `decode(encode(u)) == normalize(u)`, and `encode` is idempotent. A raw
//! query appended to a proxied URL (a submitted GET form) is carried over
//! to the decoded URL.

use url::Url;

/// Bidirectional mapping between real and proxied URLs.
pub trait UrlCodec: Send + Sync {
    /// Maps an absolute real URL to its proxied form.
    fn encode(&self, url: &str) -> String;

    /// Maps a proxied URL back to the real URL. Input that is not a proxied
    /// URL is returned unchanged.
    fn decode(&self, url: &str) -> String;
}

/// Schemes and shapes that are never routed through the proxy.
const PASSTHROUGH_SCHEMES: &[&str] = &["data:", "blob:", "javascript:", "about:", "mailto:"];

/// Returns true if `raw` must be left as-is rather than encoded.
pub fn is_passthrough_url(raw: &str) -> bool {
    let trimmed = raw.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return true;
    }
    let lower = trimmed.to_ascii_lowercase();
    PASSTHROUGH_SCHEMES.iter().any(|s| lower.starts_with(s))
}

/// Resolves `raw` against `base` and encodes the result.
///
/// Pass-through values (see [`is_passthrough_url`]) and values that cannot be
/// resolved are returned unchanged.
pub fn encode_relative(codec: &dyn UrlCodec, raw: &str, base: Option<&Url>) -> String {
    if is_passthrough_url(raw) {
        return raw.to_string();
    }
    let trimmed = raw.trim();
    let resolved = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base.map(|b| b.join(trimmed)) {
            Some(Ok(url)) => url,
            _ => return raw.to_string(),
        },
        Err(e) => {
            tracing::debug!("Leaving unparseable URL '{}' unencoded: {}", raw, e);
            return raw.to_string();
        }
    };
    codec.encode(resolved.as_str())
}

/// Codec that places the percent-encoded real URL after `origin + prefix`.
///
/// `https://example.com/a?b` becomes
/// `https://proxy.test/ramjet/https%3A%2F%2Fexample.com%2Fa%3Fb`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixCodec {
    origin: String,
    prefix: String,
    base: String,
}

impl PrefixCodec {
    /// Creates a codec for the given proxy origin and path prefix.
    pub fn new(origin: impl Into<String>, prefix: impl Into<String>) -> Self {
        let origin = origin.into().trim_end_matches('/').to_string();
        let prefix = prefix.into();
        let base = format!("{}{}", origin, prefix);
        Self {
            origin,
            prefix,
            base,
        }
    }

    /// Creates a codec from a deployment configuration.
    pub fn from_config(config: &crate::RamjetConfig) -> Self {
        Self::new(config.origin.clone(), config.prefix.clone())
    }

    /// Returns `origin + prefix`.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns the encoded part of a proxied URL, if `url` is one.
    fn encoded_part<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.base.as_str())
            .or_else(|| url.strip_prefix(self.prefix.as_str()))
    }
}

impl UrlCodec for PrefixCodec {
    fn encode(&self, url: &str) -> String {
        if url.starts_with(self.base.as_str()) {
            return url.to_string();
        }
        let normalized = Url::parse(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        format!("{}{}", self.base, urlencoding::encode(&normalized))
    }

    fn decode(&self, url: &str) -> String {
        let Some(encoded) = self.encoded_part(url) else {
            return url.to_string();
        };
        // A raw '?' or '#' can only come from a suffix appended after encoding.
        let end = encoded.find(['?', '#']).unwrap_or(encoded.len());
        let bytes = urlencoding::decode_binary(encoded[..end].as_bytes());
        let decoded = String::from_utf8_lossy(&bytes).into_owned();
        match Url::parse(&decoded) {
            Ok(mut url) => {
                merge_suffix(&mut url, &encoded[end..]);
                url.to_string()
            }
            Err(_) => decoded,
        }
    }
}

/// Query parameters the proxy itself appends to encoded URLs.
const MARKER_PARAM: &str = "dest";
const MARKER_TYPE_PARAM: &str = "type";

/// Folds a raw `?query#fragment` suffix into `url`.
///
/// Query pairs are appended to the URL's own query, minus the proxy's
/// `dest` marker (and the `type` that accompanies it). A fragment replaces
/// the URL's fragment.
fn merge_suffix(url: &mut Url, suffix: &str) {
    if suffix.is_empty() {
        return;
    }
    let (query, fragment) = match suffix.split_once('#') {
        Some((query, fragment)) => (query, Some(fragment)),
        None => (suffix, None),
    };
    let query = query.strip_prefix('?').unwrap_or(query);
    let pairs: Vec<&str> = query.split('&').filter(|pair| !pair.is_empty()).collect();
    let marked = pairs.iter().any(|pair| param_name(pair) == MARKER_PARAM);
    let kept: Vec<&str> = pairs
        .into_iter()
        .filter(|pair| {
            let name = param_name(pair);
            name != MARKER_PARAM && !(marked && name == MARKER_TYPE_PARAM)
        })
        .collect();

    if !kept.is_empty() {
        let appended = kept.join("&");
        let merged = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, appended),
            _ => appended,
        };
        url.set_query(Some(&merged));
    }
    if let Some(fragment) = fragment {
        url.set_fragment(Some(fragment));
    }
}

fn param_name(pair: &str) -> &str {
    pair.split('=').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> PrefixCodec {
        PrefixCodec::new("https://proxy.test", "/ramjet/")
    }

    #[test]
    fn encode_places_url_after_prefix() {
        let encoded = codec().encode("https://example.com/a?b=1");
        assert_eq!(
            encoded,
            "https://proxy.test/ramjet/https%3A%2F%2Fexample.com%2Fa%3Fb%3D1"
        );
    }

    #[test]
    fn decode_inverts_encode_with_normalization() {
        let codec = codec();
        for url in [
            "https://example.com",
            "https://example.com/path/to?q=a b#frag",
            "http://EXAMPLE.com:80/x",
        ] {
            let normalized = Url::parse(url).unwrap().to_string();
            assert_eq!(codec.decode(&codec.encode(url)), normalized, "{}", url);
        }
    }

    #[test]
    fn encode_is_idempotent() {
        let codec = codec();
        let once = codec.encode("https://example.com/");
        assert_eq!(codec.encode(&once), once);
    }

    #[test]
    fn decode_drops_proxy_markers() {
        let codec = codec();
        let encoded = format!("{}?dest=serviceworker", codec.encode("https://example.com/sw.js"));
        assert_eq!(codec.decode(&encoded), "https://example.com/sw.js");

        let module = format!(
            "{}?dest=serviceworker&type=module",
            codec.encode("https://example.com/sw.js")
        );
        assert_eq!(codec.decode(&module), "https://example.com/sw.js");
    }

    #[test]
    fn decode_merges_appended_query() {
        let codec = codec();
        let submitted = format!("{}?q=rust&type=book", codec.encode("https://b.test/search"));
        assert_eq!(codec.decode(&submitted), "https://b.test/search?q=rust&type=book");

        let existing = format!("{}?page=2", codec.encode("https://b.test/search?q=rust"));
        assert_eq!(codec.decode(&existing), "https://b.test/search?q=rust&page=2");
    }

    #[test]
    fn decode_applies_appended_fragment() {
        let codec = codec();
        let encoded = format!("{}#section", codec.encode("https://example.com/doc"));
        assert_eq!(codec.decode(&encoded), "https://example.com/doc#section");
    }

    #[test]
    fn decode_accepts_path_only_form() {
        let codec = codec();
        assert_eq!(
            codec.decode("/ramjet/https%3A%2F%2Fexample.com%2F"),
            "https://example.com/"
        );
    }

    #[test]
    fn decode_leaves_foreign_urls_alone() {
        assert_eq!(codec().decode("https://other.test/x"), "https://other.test/x");
    }

    #[test]
    fn encode_relative_resolves_against_base() {
        let codec = codec();
        let base = Url::parse("https://example.com/dir/page.html").unwrap();
        let encoded = encode_relative(&codec, "img.png", Some(&base));
        assert_eq!(codec.decode(&encoded), "https://example.com/dir/img.png");

        let rooted = encode_relative(&codec, "/top.css", Some(&base));
        assert_eq!(codec.decode(&rooted), "https://example.com/top.css");
    }

    #[test]
    fn encode_relative_passes_special_schemes_through() {
        let codec = codec();
        for raw in ["data:text/plain,hi", "blob:https://x/1", "javascript:void(0)", "#top", ""] {
            assert_eq!(encode_relative(&codec, raw, None), raw);
        }
    }

    #[test]
    fn encode_relative_without_base_leaves_relative_input() {
        assert_eq!(encode_relative(&codec(), "img.png", None), "img.png");
    }
}
