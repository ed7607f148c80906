//! Download normalization for page navigations.
//!
//! A navigation answered without a usable `content-disposition` gets one
//! naming the last path segment of the final URL, so downloads started
//! through the proxy keep their real file name instead of the encoded one.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static HAS_FILENAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*?((inline|attachment);\s*?)filename=").expect("valid filename pattern")
});

static ATTACHMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*?attachment").expect("valid attachment pattern"));

/// Returns the disposition to send for a page response.
///
/// A header that already carries `inline; filename=` or
/// `attachment; filename=` is kept. Anything else, including a missing or
/// malformed header, becomes `<type>; filename="<last segment>"` where the
/// type is `attachment` if the original said so and `inline` otherwise.
pub fn normalize(header: Option<&str>, final_url: &Url) -> String {
    let header = header.unwrap_or_default();
    if HAS_FILENAME.is_match(header) {
        return header.to_string();
    }
    let kind = if ATTACHMENT.is_match(header) {
        "attachment"
    } else {
        "inline"
    };
    let filename = final_url.path().rsplit('/').next().unwrap_or_default();
    // JSON string syntax gives a correctly quoted and escaped parameter.
    let quoted = serde_json::to_string(filename).unwrap_or_else(|_| "\"\"".to_string());
    format!("{}; filename={}", kind, quoted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> Url {
        Url::parse(raw).unwrap()
    }

    #[test]
    fn missing_header_defaults_to_inline_with_name() {
        let value = normalize(None, &url("https://b.test/files/report.pdf"));
        assert_eq!(value, r#"inline; filename="report.pdf""#);
    }

    #[test]
    fn attachment_type_is_kept() {
        let value = normalize(Some("attachment"), &url("https://b.test/a/data.csv"));
        assert_eq!(value, r#"attachment; filename="data.csv""#);
    }

    #[test]
    fn existing_filename_is_untouched() {
        let header = r#"attachment; filename="q3.xlsx""#;
        assert_eq!(normalize(Some(header), &url("https://b.test/download")), header);
    }

    #[test]
    fn malformed_header_defaults_to_inline() {
        let value = normalize(Some("garbage;;"), &url("https://b.test/"));
        assert_eq!(value, r#"inline; filename="""#);
    }

    #[test]
    fn filename_quotes_are_escaped() {
        let value = normalize(None, &url(r#"https://b.test/a"b"#));
        assert_eq!(value, r#"inline; filename="a%22b""#);
    }
}
