//! Owned document nodes.

use std::fmt;
use std::io;

use nestcfg_format::{WriteError, Writer};
use nestcfg_tokenizer::Key;

/// What a node holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Value,
    List,
    Section,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Value => write!(f, "value"),
            NodeKind::List => write!(f, "list"),
            NodeKind::Section => write!(f, "section"),
        }
    }
}

/// Error when using a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// The node is not of the requested kind.
    WrongKind { expected: NodeKind, found: NodeKind },
    /// The section already has an entry with this key.
    DuplicateKey(String),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::WrongKind { expected, found } => {
                write!(f, "expected a {expected}, found a {found}")
            }
            TreeError::DuplicateKey(key) => write!(f, "duplicate key `{key}`"),
        }
    }
}

impl std::error::Error for TreeError {}

/// The value of a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A single value, multiline or not.
    Value(String),
    /// A list of values.
    List(Vec<String>),
    /// A nested section.
    Section(Section),
}

impl Node {
    /// The kind of node.
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Value(_) => NodeKind::Value,
            Node::List(_) => NodeKind::List,
            Node::Section(_) => NodeKind::Section,
        }
    }

    /// Get the value text if this is a value.
    pub fn as_value(&self) -> Option<&str> {
        match self {
            Node::Value(text) => Some(text),
            _ => None,
        }
    }

    /// Get the items if this is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Node::List(items) => Some(items),
            _ => None,
        }
    }

    /// Get the section if this is a section.
    pub fn as_section(&self) -> Option<&Section> {
        match self {
            Node::Section(section) => Some(section),
            _ => None,
        }
    }

    /// Get the section mutably if this is a section.
    pub fn as_section_mut(&mut self) -> Option<&mut Section> {
        match self {
            Node::Section(section) => Some(section),
            _ => None,
        }
    }

    /// Like [`Node::as_value`], failing with [`TreeError::WrongKind`].
    pub fn expect_value(&self) -> Result<&str, TreeError> {
        self.as_value().ok_or_else(|| self.wrong_kind(NodeKind::Value))
    }

    /// Like [`Node::as_list`], failing with [`TreeError::WrongKind`].
    pub fn expect_list(&self) -> Result<&[String], TreeError> {
        self.as_list().ok_or_else(|| self.wrong_kind(NodeKind::List))
    }

    /// Like [`Node::as_section`], failing with [`TreeError::WrongKind`].
    pub fn expect_section(&self) -> Result<&Section, TreeError> {
        self.as_section()
            .ok_or_else(|| self.wrong_kind(NodeKind::Section))
    }

    fn wrong_kind(&self, expected: NodeKind) -> TreeError {
        TreeError::WrongKind {
            expected,
            found: self.kind(),
        }
    }
}

impl From<String> for Node {
    fn from(text: String) -> Self {
        Node::Value(text)
    }
}

impl From<&str> for Node {
    fn from(text: &str) -> Self {
        Node::Value(text.to_string())
    }
}

impl From<Vec<String>> for Node {
    fn from(items: Vec<String>) -> Self {
        Node::List(items)
    }
}

impl From<Section> for Node {
    fn from(section: Section) -> Self {
        Node::Section(section)
    }
}

/// Uniquely keyed entries, in insertion order.
///
/// The document root is a section too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Section {
    entries: Vec<(Key, Node)>,
}

impl Section {
    /// Create a new empty section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry at the end.
    ///
    /// Fails if `key` is already present; the section is then unchanged.
    pub fn insert(&mut self, key: Key, node: impl Into<Node>) -> Result<(), TreeError> {
        if self.contains_key(key.as_str()) {
            return Err(TreeError::DuplicateKey(key.into_string()));
        }
        self.entries.push((key, node.into()));
        Ok(())
    }

    /// Take an entry out, keeping the order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Node> {
        let index = self.entries.iter().position(|(k, _)| k.as_str() == key)?;
        Some(self.entries.remove(index).1)
    }

    /// Get an entry by key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, node)| node)
    }

    /// Get an entry mutably by key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Node> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, node)| node)
    }

    /// Get a node by a dotted path of keys, like `Server.Host`.
    ///
    /// Keys containing a `.` can only be reached with [`Section::get`].
    pub fn get_path(&self, path: &str) -> Option<&Node> {
        let (first, rest) = match path.split_once('.') {
            Some((first, rest)) => (first, Some(rest)),
            None => (path, None),
        };
        let node = self.get(first)?;
        match rest {
            None => Some(node),
            Some(rest) => node.as_section()?.get_path(rest),
        }
    }

    /// Check if key exists.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.as_str() == key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the section has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Key, &Node)> {
        self.entries.iter().map(|(key, node)| (key, node))
    }

    /// Write the entries, recursively, at the writer's current position.
    pub fn write<W: io::Write>(&self, w: &mut Writer<W>) -> Result<(), WriteError> {
        for (key, node) in &self.entries {
            w.key(key)?;
            match node {
                Node::Value(text) => w.value(text)?,
                Node::List(items) => {
                    let list = w.open_list()?;
                    for item in items {
                        w.value(item)?;
                    }
                    w.close(list)?;
                }
                Node::Section(section) => {
                    let close = w.open_section()?;
                    section.write(w)?;
                    w.close(close)?;
                }
            }
        }
        Ok(())
    }
}

impl IntoIterator for Section {
    type Item = (Key, Node);
    type IntoIter = std::vec::IntoIter<(Key, Node)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Key {
        Key::new(s).unwrap()
    }

    fn server() -> Section {
        let mut server = Section::new();
        server.insert(key("Host"), "example.org").unwrap();
        server
            .insert(key("Ports"), vec!["80".to_string(), "443".to_string()])
            .unwrap();
        let mut root = Section::new();
        root.insert(key("Server"), server).unwrap();
        root
    }

    #[test]
    fn test_duplicate_key_leaves_section_unchanged() {
        nestcfg_testhelpers::setup();
        let mut section = Section::new();
        section.insert(key("A"), "1").unwrap();
        assert_eq!(
            section.insert(key("A"), "2"),
            Err(TreeError::DuplicateKey("A".to_string()))
        );
        assert_eq!(section.len(), 1);
        assert_eq!(section.get("A").and_then(Node::as_value), Some("1"));
    }

    #[test]
    fn test_remove_keeps_order() {
        nestcfg_testhelpers::setup();
        let mut section = Section::new();
        for k in ["A", "B", "C"] {
            section.insert(key(k), k).unwrap();
        }
        assert_eq!(section.remove("B"), Some(Node::from("B")));
        assert_eq!(section.remove("B"), None);
        let keys: Vec<_> = section.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["A", "C"]);
    }

    #[test]
    fn test_get_path() {
        nestcfg_testhelpers::setup();
        let root = server();
        assert_eq!(
            root.get_path("Server.Host").and_then(Node::as_value),
            Some("example.org")
        );
        assert_eq!(
            root.get_path("Server.Ports").and_then(Node::as_list),
            Some(&["80".to_string(), "443".to_string()][..])
        );
        assert!(root.get_path("Server.Host.Name").is_none());
        assert!(root.get_path("Missing").is_none());
        assert!(root.get_path("").is_none());
    }

    #[test]
    fn test_expect_wrong_kind() {
        nestcfg_testhelpers::setup();
        let root = server();
        let node = root.get("Server").unwrap();
        assert!(node.expect_section().is_ok());
        let err = node.expect_value().unwrap_err();
        assert_eq!(
            err,
            TreeError::WrongKind {
                expected: NodeKind::Value,
                found: NodeKind::Section,
            }
        );
        assert_eq!(err.to_string(), "expected a value, found a section");
    }

    #[test]
    fn test_write() {
        nestcfg_testhelpers::setup();
        let mut w = Writer::with_options(
            Vec::new(),
            nestcfg_format::WriterOptions::new().newline(nestcfg_format::Newline::Lf),
        )
        .unwrap();
        server().write(&mut w).unwrap();
        w.finish().unwrap();
        assert_eq!(
            String::from_utf8(w.into_inner()).unwrap(),
            "Server{\n\tHost:example.org\n\tPorts:{\n\t\t80\n\t\t443\n\t}\n}\n"
        );
    }
}
