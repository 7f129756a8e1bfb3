//! Slash-separated paths into the tree

use crate::{Error, Result};
use std::fmt;

/// A parsed path such as `/Documents/notes.txt`; `/` is the root
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TreePath(Vec<String>);

impl TreePath {
    /// The root path
    pub fn root() -> Self {
        TreePath(Vec::new())
    }

    /// Parse a path; the leading slash is optional, one trailing slash is ignored
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.strip_prefix('/').unwrap_or(s);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Ok(TreePath::root());
        }

        let mut segments = Vec::new();
        for segment in trimmed.split('/') {
            match segment {
                "" => return Err(Error::InvalidPath(format!("empty segment in '{}'", s))),
                "." | ".." => {
                    return Err(Error::InvalidPath(format!(
                        "relative segment '{}' in '{}'",
                        segment, s
                    )))
                }
                _ => segments.push(segment.to_string()),
            }
        }
        Ok(TreePath(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Final segment, `None` for the root
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Parent path; the parent of the root is the root
    pub fn parent(&self) -> TreePath {
        self.prefix(self.0.len().saturating_sub(1))
    }

    /// The first `len` segments
    pub fn prefix(&self, len: usize) -> TreePath {
        TreePath(self.0[..len.min(self.0.len())].to_vec())
    }

    /// Append a segment
    pub fn join(&self, name: &str) -> TreePath {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        TreePath(segments)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for segment in &self.0 {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for TreePath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TreePath::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = TreePath::parse("/Documents/notes.txt").unwrap();
        assert_eq!(path.segments(), &["Documents", "notes.txt"]);
        assert_eq!(path.to_string(), "/Documents/notes.txt");
        assert_eq!(TreePath::parse("Documents/notes.txt/").unwrap(), path);
    }

    #[test]
    fn test_root() {
        for s in ["", "/", "//"] {
            // "//" is a root slash followed by a trailing slash
            assert!(TreePath::parse(s).unwrap().is_root(), "{:?}", s);
        }
        assert_eq!(TreePath::root().to_string(), "/");
        assert_eq!(TreePath::root().parent(), TreePath::root());
        assert!(TreePath::root().name().is_none());
    }

    #[test]
    fn test_rejects_bad_segments() {
        assert!(TreePath::parse("/a//b").is_err());
        assert!(TreePath::parse("/a/../b").is_err());
        assert!(TreePath::parse("./a").is_err());
    }

    #[test]
    fn test_parent_and_name() {
        let path = TreePath::parse("/a/b/c").unwrap();
        assert_eq!(path.name(), Some("c"));
        assert_eq!(path.parent().to_string(), "/a/b");
        assert_eq!(path.prefix(1).to_string(), "/a");
        assert_eq!(path.parent().join("d").to_string(), "/a/b/d");
    }
}
