//! Validated member paths (`"navigator.serviceWorker.register"`).

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::host::{ObjectRef, Value};

/// Member path parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The path has no segments.
    #[error("member path is empty")]
    Empty,

    /// One of the dot-separated segments is empty.
    #[error("member path '{0}' has an empty segment")]
    EmptySegment(String),
}

/// A non-empty, dot-separated member chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberPath {
    segments: Vec<String>,
}

impl MemberPath {
    /// Parses a dot-separated path.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment(path.to_string()));
        }
        Ok(Self { segments })
    }

    /// Returns all segments.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the last segment: the member being intercepted.
    pub fn member(&self) -> &str {
        // parse() guarantees at least one segment
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Returns the segments leading to the member's parent object.
    pub fn parent_segments(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// Walks the parent chain from `root`.
    ///
    /// Returns the parent object and member name, or `None` as soon as a
    /// segment is absent, not an object, or cannot be read.
    pub fn resolve(&self, root: &ObjectRef) -> Option<(ObjectRef, String)> {
        let mut current = root.clone();
        for segment in self.parent_segments() {
            current = match current.get(segment) {
                Ok(Value::Object(next)) => next,
                _ => return None,
            };
        }
        Some((current, self.member().to_string()))
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for MemberPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::Property;

    #[test]
    fn parse_splits_segments() {
        let path = MemberPath::parse("navigator.serviceWorker.register").unwrap();
        assert_eq!(path.segments().len(), 3);
        assert_eq!(path.member(), "register");
        assert_eq!(path.parent_segments(), &["navigator", "serviceWorker"]);
        assert_eq!(path.to_string(), "navigator.serviceWorker.register");
    }

    #[test]
    fn parse_rejects_malformed_paths() {
        assert_eq!(MemberPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            MemberPath::parse("a..b"),
            Err(PathError::EmptySegment(_))
        ));
        assert!("a.".parse::<MemberPath>().is_err());
    }

    #[test]
    fn resolve_walks_parent_chain() {
        let root = ObjectRef::new("Window");
        let navigator = ObjectRef::new("Navigator");
        root.define_property("navigator", Property::data(navigator.clone()));

        let path = MemberPath::parse("navigator.userAgent").unwrap();
        let (parent, member) = path.resolve(&root).unwrap();
        assert!(parent.ptr_eq(&navigator));
        assert_eq!(member, "userAgent");

        let single = MemberPath::parse("fetch").unwrap();
        let (parent, _) = single.resolve(&root).unwrap();
        assert!(parent.ptr_eq(&root));
    }

    #[test]
    fn resolve_fails_closed_on_missing_segment() {
        let root = ObjectRef::new("Window");
        root.define_property("count", Property::data(1.0));
        assert!(MemberPath::parse("Missing.prototype.x")
            .unwrap()
            .resolve(&root)
            .is_none());
        assert!(MemberPath::parse("count.x").unwrap().resolve(&root).is_none());
    }
}
