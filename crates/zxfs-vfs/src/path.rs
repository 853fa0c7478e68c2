//! Namespace paths: `zxtm://host:port/[Rules/[name.zts]]`.
//!
//! Parsing goes through the `url` crate, then segments are percent-decoded
//! and normalized: empty segments and `.` are dropped and `..` pops. The
//! canonical URI ([`NamespacePath::to_uri`]) never ends in a slash except at
//! the root, so trailing-slash variants share one cache key.

use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;
use zxfs_core::domain::HostKey;

use crate::error::VfsError;
use crate::naming::SCHEME;

/// Characters escaped when a segment is written back into a URI.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A normalized location in the namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacePath {
    host: HostKey,
    segments: Vec<String>,
}

impl NamespacePath {
    /// The root of `host`
    pub fn root(host: HostKey) -> Self {
        Self {
            host,
            segments: Vec::new(),
        }
    }

    /// Builds a path from decoded segments, normalizing them.
    pub fn new<I, S>(host: HostKey, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = Self::root(host);
        for segment in segments {
            path.push(segment.into());
        }
        path
    }

    /// Parses a namespace URI.
    ///
    /// # Errors
    /// `VfsError::InvalidPath` if the string is not a URI of this scheme
    /// with an explicit host and port, or carries credentials, a query or a
    /// fragment.
    pub fn parse(uri: &str) -> Result<Self, VfsError> {
        let url = Url::parse(uri).map_err(|e| VfsError::InvalidPath(format!("{uri}: {e}")))?;
        if url.scheme() != SCHEME {
            return Err(VfsError::InvalidPath(format!(
                "{uri}: expected scheme '{SCHEME}'"
            )));
        }
        if !url.username().is_empty() || url.password().is_some() {
            return Err(VfsError::InvalidPath(format!(
                "{uri}: credentials are not allowed in paths"
            )));
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(VfsError::InvalidPath(format!(
                "{uri}: query and fragment are not allowed"
            )));
        }
        let address = url
            .host_str()
            .ok_or_else(|| VfsError::InvalidPath(format!("{uri}: missing host")))?;
        let port = url
            .port()
            .ok_or_else(|| VfsError::InvalidPath(format!("{uri}: missing port")))?;
        let host =
            HostKey::new(address, port).map_err(|e| VfsError::InvalidPath(e.to_string()))?;

        let mut path = Self::root(host);
        for raw in url.path().split('/') {
            let decoded = percent_decode_str(raw)
                .decode_utf8()
                .map_err(|e| VfsError::InvalidPath(format!("{uri}: {e}")))?;
            path.push(decoded.into_owned());
        }
        Ok(path)
    }

    fn push(&mut self, segment: String) {
        match segment.as_str() {
            "" | "." => {}
            ".." => {
                self.segments.pop();
            }
            _ => self.segments.push(segment),
        }
    }

    pub fn host(&self) -> &HostKey {
        &self.host
    }

    /// Decoded segments below the host root
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` at the root
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Path of the direct child `name`
    pub fn child(&self, name: &str) -> Self {
        let mut child = self.clone();
        child.push(name.to_string());
        child
    }

    /// Path of the parent directory, `None` at the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    /// Canonical URI; also the handle cache key
    pub fn to_uri(&self) -> String {
        let mut uri = format!("{SCHEME}://{}/", self.host);
        let encoded: Vec<String> = self
            .segments
            .iter()
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect();
        uri.push_str(&encoded.join("/"));
        uri
    }
}

impl fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        let path = NamespacePath::parse("zxtm://h1:9090").unwrap();
        assert!(path.is_root());
        assert_eq!(path.host().to_string(), "h1:9090");
        assert_eq!(path.to_uri(), "zxtm://h1:9090/");
        assert_eq!(NamespacePath::parse("zxtm://h1:9090/").unwrap(), path);
    }

    #[test]
    fn test_parse_rule_path() {
        let path = NamespacePath::parse("zxtm://h1:9090/Rules/a~cb.zts").unwrap();
        assert_eq!(path.segments(), ["Rules", "a~cb.zts"]);
        assert_eq!(path.name(), Some("a~cb.zts"));
    }

    #[test]
    fn test_trailing_slash_is_folded() {
        let a = NamespacePath::parse("zxtm://h1:9090/Rules").unwrap();
        let b = NamespacePath::parse("zxtm://h1:9090/Rules/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_uri(), "zxtm://h1:9090/Rules");
        assert_eq!(b.to_uri(), a.to_uri());
    }

    #[test]
    fn test_dot_segments_are_collapsed() {
        let path = NamespacePath::parse("zxtm://h1:9090/Rules/./x/../Foo.zts").unwrap();
        assert_eq!(path.segments(), ["Rules", "Foo.zts"]);
        let up = NamespacePath::parse("zxtm://h1:9090/../Rules").unwrap();
        assert_eq!(up.segments(), ["Rules"]);
    }

    #[test]
    fn test_percent_encoding_round_trip() {
        let path = NamespacePath::parse("zxtm://h1:9090/Rules/My%20Rule.zts").unwrap();
        assert_eq!(path.name(), Some("My Rule.zts"));
        assert_eq!(path.to_uri(), "zxtm://h1:9090/Rules/My%20Rule.zts");
    }

    #[test]
    fn test_rejects_foreign_or_incomplete_uris() {
        assert!(matches!(
            NamespacePath::parse("http://h1:9090/Rules"),
            Err(VfsError::InvalidPath(_))
        ));
        assert!(NamespacePath::parse("zxtm://h1/Rules").is_err());
        assert!(NamespacePath::parse("zxtm://h1:0/").is_err());
        assert!(NamespacePath::parse("zxtm://u:p@h1:9090/").is_err());
        assert!(NamespacePath::parse("zxtm://h1:9090/Rules?x=1").is_err());
        assert!(NamespacePath::parse("not a uri").is_err());
    }

    #[test]
    fn test_host_identity_is_lexical() {
        let a = NamespacePath::parse("zxtm://localhost:9090/").unwrap();
        let b = NamespacePath::parse("zxtm://127.0.0.1:9090/").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_child_and_parent() {
        let root = NamespacePath::root(HostKey::new("h1", 9090).unwrap());
        let rules = root.child("Rules");
        let rule = rules.child("Foo.zts");
        assert_eq!(rule.to_uri(), "zxtm://h1:9090/Rules/Foo.zts");
        assert_eq!(rule.parent(), Some(rules.clone()));
        assert_eq!(rules.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
    }
}
