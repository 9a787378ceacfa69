//! Absolute configuration paths.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;

/// One step of a [`ConfigPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Named key of a mapping, e.g. `attachments` or `0`
    Key(String),
    /// Element of a list
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "/{}", key),
            Segment::Index(index) => write!(f, "[{}]", index),
        }
    }
}

/// Absolute path of a configuration node, starting at the tracked root.
///
/// Renders as `/` for the root, `/attachments/0` for named keys and
/// `/attachments[0]` for list elements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ConfigPath {
    segments: Vec<Segment>,
}

impl ConfigPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Path of a named child below this path.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.into()));
        Self { segments }
    }

    /// Path of a list element below this path.
    pub fn list_child(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    /// Path with the last segment dropped. The root is its own parent.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// Appends all segments of `other` below this path.
    pub fn join(&self, other: &ConfigPath) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn is_list_element(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Index(_)))
    }
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "/");
        }
        write!(f, "{}", self.segments.iter().join(""))
    }
}

/// Error parsing a [`ConfigPath`] from text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid config path '{input}': {reason}")]
pub struct PathParseError {
    pub input: String,
    pub reason: String,
}

impl FromStr for ConfigPath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| PathParseError {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let rest = s.strip_prefix('/').ok_or_else(|| err("must start with '/'"))?;

        let mut segments = Vec::new();
        for part in rest.split('/').filter(|p| !p.is_empty()) {
            // `key[1][2]` -> Key(key), Index(1), Index(2)
            let (key, mut indices) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };
            if key.contains(']') {
                return Err(err("unexpected ']'"));
            }
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            while !indices.is_empty() {
                let close = indices.find(']').ok_or_else(|| err("unclosed '['"))?;
                let index = indices[1..close]
                    .parse::<usize>()
                    .map_err(|_| err("list index is not a number"))?;
                segments.push(Segment::Index(index));
                indices = &indices[close + 1..];
                if !indices.is_empty() && !indices.starts_with('[') {
                    return Err(err("unexpected text after ']'"));
                }
            }
        }
        Ok(Self { segments })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_root_when_displaying_then_renders_slash() {
        assert_eq!(ConfigPath::root().to_string(), "/");
    }

    #[test]
    fn given_keys_and_indices_when_displaying_then_uses_both_notations() {
        let path = ConfigPath::root()
            .child("attachments")
            .child("0")
            .child("attachments")
            .list_child(2);
        assert_eq!(path.to_string(), "/attachments/0/attachments[2]");
        assert!(path.is_list_element());
        assert!(!path.parent().is_list_element());
    }

    #[test]
    fn given_rendered_path_when_parsing_then_yields_same_path() {
        let path: ConfigPath = "/attachments/0/attachments[2][3]".parse().unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("attachments".into()),
                Segment::Key("0".into()),
                Segment::Key("attachments".into()),
                Segment::Index(2),
                Segment::Index(3),
            ]
        );
        assert_eq!("/".parse::<ConfigPath>().unwrap(), ConfigPath::root());
    }

    #[test]
    fn given_malformed_text_when_parsing_then_errors() {
        assert!("attachments".parse::<ConfigPath>().is_err());
        assert!("/a[x]".parse::<ConfigPath>().is_err());
        assert!("/a[1".parse::<ConfigPath>().is_err());
        assert!("/a]".parse::<ConfigPath>().is_err());
        assert!("/a][0]".parse::<ConfigPath>().is_err());
    }

    #[test]
    fn given_two_paths_when_joining_then_concatenates() {
        let base: ConfigPath = "/attachments/1".parse().unwrap();
        let local: ConfigPath = "/attachments/0".parse().unwrap();
        assert_eq!(base.join(&local).to_string(), "/attachments/1/attachments/0");
        assert_eq!(base.join(&ConfigPath::root()), base);
        assert_eq!(ConfigPath::root().parent(), ConfigPath::root());
    }
}
