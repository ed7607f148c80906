//! Header maps exchanged with the rewriters.

use std::collections::BTreeMap;

/// Headers that must never be folded, one line per value.
const MULTI_VALUED: &[&str] = &["set-cookie"];

/// A flat header map keyed by lower-cased header name.
///
/// Repeated headers are folded into one comma-separated value, which is what
/// the rewriters and the page-visible `Headers` surface observe. `set-cookie`
/// is the exception: its values contain commas (`Expires=`), so each one is
/// kept and iterated separately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawHeaders {
    entries: BTreeMap<String, Vec<String>>,
}

impl RawHeaders {
    /// Creates an empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `name`, case-insensitively. For `set-cookie`
    /// this is the first value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value stored for `name`.
    pub fn get_all(&self, name: &str) -> impl Iterator<Item = &str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Sets `name` to `value`, replacing any previous values.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .insert(name.to_ascii_lowercase(), vec![value.into()]);
    }

    /// Appends `value` to `name`, folding with a comma when already present.
    pub fn append(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        let multi = MULTI_VALUED.contains(&name.as_str());
        let values = self.entries.entry(name).or_default();
        match values.first_mut() {
            Some(existing) if !multi => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            _ => values.push(value.to_string()),
        }
    }

    /// Removes `name`, returning its (first) value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.entries
            .remove(&name.to_ascii_lowercase())
            .and_then(|values| values.into_iter().next())
    }

    /// Returns true if `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Iterates over `(name, value)` pairs in name order. Multi-valued
    /// headers yield one pair per value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str())))
    }

    /// Returns the number of distinct header names.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for RawHeaders {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.append(name.as_ref(), &value.into());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_case_insensitive() {
        let mut headers = RawHeaders::new();
        headers.insert("Content-Type", "text/html");
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("text/html"));
        assert!(headers.contains("Content-type"));
    }

    #[test]
    fn append_folds_values() {
        let headers: RawHeaders = [("Vary", "accept"), ("vary", "origin")].into_iter().collect();
        assert_eq!(headers.get("vary"), Some("accept, origin"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn set_cookie_values_stay_separate() {
        let mut headers = RawHeaders::new();
        headers.append("Set-Cookie", "a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT");
        headers.append("set-cookie", "b=2; Path=/");
        let cookies: Vec<_> = headers.get_all("set-cookie").collect();
        assert_eq!(
            cookies,
            ["a=1; Expires=Wed, 21 Oct 2026 07:28:00 GMT", "b=2; Path=/"]
        );
        assert_eq!(headers.iter().count(), 2);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn remove_returns_value() {
        let mut headers = RawHeaders::new();
        headers.insert("x-test", "1");
        assert_eq!(headers.remove("X-Test").as_deref(), Some("1"));
        assert!(headers.is_empty());
    }
}
