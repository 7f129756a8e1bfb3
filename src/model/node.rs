//! Tree node types - leaves and containers

use super::TreePath;
use crate::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A primitive value with no children (file content or a scalar setting)
///
/// Serialized as the bare JSON scalar.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Leaf {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Leaf {
    /// Convert a JSON value into a leaf, if it is a scalar
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(Leaf::Null),
            serde_json::Value::Bool(b) => Some(Leaf::Bool(b)),
            serde_json::Value::Number(n) => Some(Leaf::Number(n)),
            serde_json::Value::String(s) => Some(Leaf::String(s)),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    /// Convert into a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Leaf::Null => serde_json::Value::Null,
            Leaf::Bool(b) => serde_json::Value::Bool(*b),
            Leaf::Number(n) => serde_json::Value::Number(n.clone()),
            Leaf::String(s) => serde_json::Value::String(s.clone()),
        }
    }

    /// Leaf holding a float, `None` for NaN and infinities
    pub fn float(value: f64) -> Option<Self> {
        Number::from_f64(value).map(Leaf::Number)
    }

    /// Feed a type-tagged, unambiguous byte form of this leaf into a hasher
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        match self {
            Leaf::Null => {
                hasher.update(&[0]);
            }
            Leaf::Bool(b) => {
                hasher.update(&[1, *b as u8]);
            }
            Leaf::Number(n) => {
                let text = n.to_string();
                hasher.update(&[2]);
                hasher.update(&(text.len() as u64).to_le_bytes());
                hasher.update(text.as_bytes());
            }
            Leaf::String(s) => {
                hasher.update(&[3]);
                hasher.update(&(s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
        }
    }
}

impl From<&str> for Leaf {
    fn from(s: &str) -> Self {
        Leaf::String(s.to_string())
    }
}

impl From<String> for Leaf {
    fn from(s: String) -> Self {
        Leaf::String(s)
    }
}

impl From<bool> for Leaf {
    fn from(b: bool) -> Self {
        Leaf::Bool(b)
    }
}

impl From<i32> for Leaf {
    fn from(n: i32) -> Self {
        Leaf::Number(n.into())
    }
}

impl From<i64> for Leaf {
    fn from(n: i64) -> Self {
        Leaf::Number(n.into())
    }
}

impl From<u64> for Leaf {
    fn from(n: u64) -> Self {
        Leaf::Number(n.into())
    }
}

/// A node in the tree: either a leaf or a nested container
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Node {
    Leaf(Leaf),
    Container(Container),
}

impl Node {
    pub fn is_container(&self) -> bool {
        matches!(self, Node::Container(_))
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Node::Container(c) => Some(c),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Leaf> {
        match self {
            Node::Leaf(l) => Some(l),
            Node::Container(_) => None,
        }
    }
}

impl From<Leaf> for Node {
    fn from(leaf: Leaf) -> Self {
        Node::Leaf(leaf)
    }
}

impl From<Container> for Node {
    fn from(container: Container) -> Self {
        Node::Container(container)
    }
}

/// A directory: an insertion-ordered mapping of unique names to nodes
///
/// Equality is map equality; insertion order does not take part in it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Container(IndexMap<String, Node>);

impl Container {
    /// Create an empty container
    pub fn new() -> Self {
        Container(IndexMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, node: impl Into<Node>) -> Self {
        self.insert(name, node);
        self
    }

    /// Insert or replace a child, returning the previous node
    pub fn insert(&mut self, name: impl Into<String>, node: impl Into<Node>) -> Option<Node> {
        self.0.insert(name.into(), node.into())
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.0.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.0.get_mut(name)
    }

    /// Remove a child, keeping the order of the remaining entries
    pub fn remove(&mut self, name: &str) -> Option<Node> {
        self.0.shift_remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.0.iter()
    }

    /// Child names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Direct leaf children, in insertion order
    pub fn leaves(&self) -> IndexMap<String, Leaf> {
        self.0
            .iter()
            .filter_map(|(name, node)| node.as_leaf().map(|l| (name.clone(), l.clone())))
            .collect()
    }

    /// Direct container children, in insertion order
    pub fn subdirs(&self) -> impl Iterator<Item = (&String, &Container)> {
        self.0
            .iter()
            .filter_map(|(name, node)| node.as_container().map(|c| (name, c)))
    }

    /// Non-empty, and every child is a leaf
    pub fn is_terminal_group(&self) -> bool {
        !self.0.is_empty() && self.0.values().all(|n| !n.is_container())
    }

    /// Resolve a path relative to this container
    pub fn get_path(&self, path: &TreePath) -> Option<&Node> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for segment in parents {
            current = current.get(segment)?.as_container()?;
        }
        current.get(last)
    }

    /// Resolve a path to a container; the root path resolves to `self`
    pub fn dir(&self, path: &TreePath) -> Result<&Container> {
        if path.is_root() {
            return Ok(self);
        }
        match self.get_path(path) {
            Some(Node::Container(c)) => Ok(c),
            Some(Node::Leaf(_)) => Err(Error::NotADirectory(path.to_string())),
            None => Err(Error::NotFound(path.to_string())),
        }
    }

    fn dir_mut(&mut self, path: &TreePath) -> Result<&mut Container> {
        let mut current = self;
        for (depth, segment) in path.segments().iter().enumerate() {
            let shown = || path.prefix(depth + 1).to_string();
            current = match current.get_mut(segment) {
                Some(Node::Container(c)) => c,
                Some(Node::Leaf(_)) => return Err(Error::NotADirectory(shown())),
                None => return Err(Error::NotFound(shown())),
            };
        }
        Ok(current)
    }

    /// Insert a node at `path`; the parent directory must already exist
    pub fn insert_path(&mut self, path: &TreePath, node: Node) -> Result<Option<Node>> {
        let name = path
            .name()
            .ok_or_else(|| Error::InvalidPath("cannot replace the root".into()))?;
        let parent = self.dir_mut(&path.parent())?;
        Ok(parent.insert(name, node))
    }

    /// Remove the node at `path`
    pub fn remove_path(&mut self, path: &TreePath) -> Result<Node> {
        let name = path
            .name()
            .ok_or_else(|| Error::InvalidPath("cannot remove the root".into()))?;
        let parent = self.dir_mut(&path.parent())?;
        parent
            .remove(name)
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }
}

impl FromIterator<(String, Node)> for Container {
    fn from_iter<I: IntoIterator<Item = (String, Node)>>(iter: I) -> Self {
        Container(iter.into_iter().collect())
    }
}

impl IntoIterator for Container {
    type Item = (String, Node);
    type IntoIter = indexmap::map::IntoIter<String, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Container {
        Container::new()
            .with("theme", Leaf::from("dark"))
            .with(
                "Documents",
                Container::new()
                    .with("notes.txt", Leaf::from("hello"))
                    .with("Work", Container::new()),
            )
    }

    #[test]
    fn test_json_shape() {
        let tree: Container =
            serde_json::from_str(r#"{"a": 1, "b": null, "Dir": {"f": "x", "g": true}}"#).unwrap();
        assert_eq!(tree.get("a"), Some(&Node::Leaf(Leaf::from(1))));
        assert_eq!(tree.get("b"), Some(&Node::Leaf(Leaf::Null)));
        let dir = tree.get("Dir").unwrap().as_container().unwrap();
        assert!(dir.is_terminal_group());

        let back = serde_json::to_value(&tree).unwrap();
        assert_eq!(
            back,
            serde_json::json!({"a": 1, "b": null, "Dir": {"f": "x", "g": true}})
        );
    }

    #[test]
    fn test_arrays_are_rejected() {
        let parsed: std::result::Result<Container, _> = serde_json::from_str(r#"{"a": [1, 2]}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_terminal_group_classification() {
        assert!(!Container::new().is_terminal_group());
        assert!(Container::new().with("f", Leaf::Null).is_terminal_group());
        assert!(!sample().is_terminal_group());
    }

    #[test]
    fn test_leaves_and_subdirs_split() {
        let tree = sample();
        let leaves = tree.leaves();
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves.get("theme"), Some(&Leaf::from("dark")));
        let subdirs: Vec<_> = tree.subdirs().map(|(n, _)| n.as_str()).collect();
        assert_eq!(subdirs, vec!["Documents"]);
    }

    #[test]
    fn test_path_operations() {
        let mut tree = sample();
        let path = TreePath::parse("/Documents/Work/plan.txt").unwrap();
        assert!(tree.insert_path(&path, Leaf::from("ship it").into()).unwrap().is_none());
        assert_eq!(tree.get_path(&path), Some(&Node::Leaf(Leaf::from("ship it"))));

        let removed = tree.remove_path(&path).unwrap();
        assert_eq!(removed, Node::Leaf(Leaf::from("ship it")));
        assert!(tree.get_path(&path).is_none());
    }

    #[test]
    fn test_insert_under_missing_parent_fails() {
        let mut tree = sample();
        let path = TreePath::parse("/Nope/file").unwrap();
        let err = tree.insert_path(&path, Leaf::Null.into()).unwrap_err();
        assert!(matches!(err, Error::NotFound(p) if p == "/Nope"));
    }

    #[test]
    fn test_insert_under_leaf_fails() {
        let mut tree = sample();
        let path = TreePath::parse("/theme/inner").unwrap();
        let err = tree.insert_path(&path, Leaf::Null.into()).unwrap_err();
        assert!(matches!(err, Error::NotADirectory(p) if p == "/theme"));
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = Container::new().with("x", Leaf::from(1)).with("y", Leaf::from(2));
        let b = Container::new().with("y", Leaf::from(2)).with("x", Leaf::from(1));
        assert_eq!(a, b);
    }
}
