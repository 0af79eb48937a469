//! Tree builder from tokens.

use std::fmt;

use nestcfg_tokenizer::{Key, KeyError, ParseError, Token};
use tracing::debug;

use crate::node::{Node, Section, TreeError};

/// Error during tree building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The tokenizer reported malformed input.
    Parse(ParseError),
    /// A key appeared twice in the same section. The path is dotted from
    /// the root.
    DuplicateKey { path: String },
    /// A token carried a key the tree cannot hold.
    InvalidKey(KeyError),
    /// A token that does not fit where it appeared.
    UnexpectedToken(String),
    /// The tokens ended with sections or lists still open.
    Unclosed(usize),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Parse(err) => write!(f, "{err}"),
            BuildError::DuplicateKey { path } => write!(f, "duplicate key `{path}`"),
            BuildError::InvalidKey(err) => write!(f, "invalid key: {err}"),
            BuildError::UnexpectedToken(msg) => write!(f, "unexpected token: {msg}"),
            BuildError::Unclosed(n) => write!(f, "{n} sections or lists left open"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Parse(err) => Some(err),
            BuildError::InvalidKey(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ParseError> for BuildError {
    fn from(err: ParseError) -> Self {
        BuildError::Parse(err)
    }
}

/// Builds a [`Section`] from the tokens of any tokenizer.
///
/// Multiline values are accepted both folded into one `Value` token and as
/// the `Key`, `StartMultiline`, line values, `EndMultiline` sequence of the
/// buffer tokenizer. Comments are dropped.
#[derive(Debug, Default)]
pub struct TreeBuilder {
    root: Section,
    stack: Vec<Frame>,
    /// Key and text of the multiline value being read.
    multiline: Option<(String, String)>,
    ended: bool,
}

#[derive(Debug)]
enum Frame {
    Section { key: Key, section: Section },
    List { key: Key, items: Vec<String> },
}

impl Frame {
    fn key(&self) -> &Key {
        match self {
            Frame::Section { key, .. } | Frame::List { key, .. } => key,
        }
    }
}

fn key(key: &str) -> Result<Key, BuildError> {
    Key::new(key).map_err(BuildError::InvalidKey)
}

fn unexpected(what: &str) -> BuildError {
    debug!(what, "unexpected token");
    BuildError::UnexpectedToken(what.to_string())
}

impl TreeBuilder {
    /// Create a new tree builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next token.
    ///
    /// `NeedMoreData` is ignored, so a builder can follow a buffer tokenizer
    /// across refills.
    pub fn token(&mut self, token: Token<'_>) -> Result<(), BuildError> {
        if self.ended && !matches!(token, Token::End) {
            return Err(unexpected("token after the end of the document"));
        }
        match token {
            Token::NeedMoreData | Token::Comment { .. } | Token::StartMultiline => {}
            Token::Key { key } => self.multiline = Some((key.into_owned(), String::new())),
            Token::Value { text, .. } if self.multiline.is_some() => {
                if let Some((_, folded)) = &mut self.multiline {
                    folded.push_str(&text.newline);
                    folded.push_str(&text.raw);
                }
            }
            Token::Value { key: k, text } => {
                let node = Node::Value(text.unescaped().into_owned());
                self.insert(key(&k)?, node)?;
            }
            Token::EndMultiline => {
                let Some((k, text)) = self.multiline.take() else {
                    return Err(unexpected("end of a multiline value that never started"));
                };
                self.insert(key(&k)?, Node::Value(text))?;
            }
            Token::StartList { key: k } => self.stack.push(Frame::List {
                key: key(&k)?,
                items: Vec::new(),
            }),
            Token::ListValue { text } => match self.stack.last_mut() {
                Some(Frame::List { items, .. }) => items.push(text.unescaped().into_owned()),
                _ => return Err(unexpected("list value outside a list")),
            },
            Token::EndList { .. } => match self.stack.pop() {
                Some(Frame::List { key, items }) => self.insert(key, Node::List(items))?,
                other => {
                    self.stack.extend(other);
                    return Err(unexpected("end of a list that is not open"));
                }
            },
            Token::StartSection { key: k } => self.stack.push(Frame::Section {
                key: key(&k)?,
                section: Section::new(),
            }),
            Token::EndSection { .. } => match self.stack.pop() {
                Some(Frame::Section { key, section }) => {
                    self.insert(key, Node::Section(section))?
                }
                other => {
                    self.stack.extend(other);
                    return Err(unexpected("end of a section that is not open"));
                }
            },
            Token::End => {
                self.check_closed()?;
                self.ended = true;
            }
            Token::Error(err) => {
                debug!(%err, "tokenizer error");
                return Err(BuildError::Parse(err));
            }
        }
        Ok(())
    }

    /// Finish building and return the root section.
    ///
    /// The `End` token is optional; the tokenizer iterators do not yield it.
    pub fn finish(self) -> Result<Section, BuildError> {
        self.check_closed()?;
        Ok(self.root)
    }

    fn check_closed(&self) -> Result<(), BuildError> {
        let open = self.stack.len() + usize::from(self.multiline.is_some());
        if open > 0 {
            return Err(BuildError::Unclosed(open));
        }
        Ok(())
    }

    fn insert(&mut self, key: Key, node: Node) -> Result<(), BuildError> {
        let target = match self.stack.last_mut() {
            None => &mut self.root,
            Some(Frame::Section { section, .. }) => section,
            Some(Frame::List { .. }) => return Err(unexpected("entry inside a list")),
        };
        match target.insert(key, node) {
            Ok(()) => Ok(()),
            Err(TreeError::DuplicateKey(duplicate)) => {
                let mut path: Vec<&str> = self.stack.iter().map(|f| f.key().as_str()).collect();
                path.push(&duplicate);
                let path = path.join(".");
                debug!(path, "duplicate key");
                Err(BuildError::DuplicateKey { path })
            }
            Err(err) => Err(unexpected(&err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::borrow::Cow;

    use nestcfg_tokenizer::{ParseErrorKind, Text};

    use super::*;

    fn build(tokens: Vec<Token<'static>>) -> Result<Section, BuildError> {
        let mut builder = TreeBuilder::new();
        for token in tokens {
            builder.token(token)?;
        }
        builder.finish()
    }

    fn k(s: &'static str) -> Cow<'static, str> {
        Cow::Borrowed(s)
    }

    #[test]
    fn test_unfolded_multiline() {
        nestcfg_testhelpers::setup();
        let section = build(vec![
            Token::Key { key: k("Motd") },
            Token::StartMultiline,
            Token::Value {
                key: k("Motd"),
                text: Text::line("", "first"),
            },
            Token::NeedMoreData,
            Token::Value {
                key: k("Motd"),
                text: Text::line("\r\n", "second"),
            },
            Token::EndMultiline,
            Token::End,
        ])
        .unwrap();
        assert_eq!(
            section.get("Motd").and_then(Node::as_value),
            Some("first\r\nsecond")
        );
    }

    #[test]
    fn test_quoted_values_are_unescaped() {
        nestcfg_testhelpers::setup();
        let section = build(vec![
            Token::Value {
                key: k("A"),
                text: Text::quoted("it''s", nestcfg_tokenizer::Quote::Single),
            },
            Token::StartList { key: k("L") },
            Token::ListValue {
                text: Text::quoted("say \"\"hi\"\"", nestcfg_tokenizer::Quote::Double),
            },
            Token::EndList { key: k("L") },
        ])
        .unwrap();
        assert_eq!(section.get("A").and_then(Node::as_value), Some("it's"));
        assert_eq!(
            section.get("L").and_then(Node::as_list),
            Some(&["say \"hi\"".to_string()][..])
        );
    }

    #[test]
    fn test_duplicate_key_path() {
        nestcfg_testhelpers::setup();
        let err = build(vec![
            Token::StartSection { key: k("Server") },
            Token::Value {
                key: k("Host"),
                text: Text::plain("a"),
            },
            Token::Value {
                key: k("Host"),
                text: Text::plain("b"),
            },
        ])
        .unwrap_err();
        assert_eq!(
            err,
            BuildError::DuplicateKey {
                path: "Server.Host".to_string()
            }
        );
    }

    #[test]
    fn test_unclosed() {
        nestcfg_testhelpers::setup();
        let err = build(vec![
            Token::StartSection { key: k("A") },
            Token::StartList { key: k("B") },
        ])
        .unwrap_err();
        assert_eq!(err, BuildError::Unclosed(2));
    }

    #[test]
    fn test_mismatched_close() {
        nestcfg_testhelpers::setup();
        let err = build(vec![
            Token::StartList { key: k("A") },
            Token::EndSection { key: k("A") },
        ])
        .unwrap_err();
        assert!(matches!(err, BuildError::UnexpectedToken(_)));
    }

    #[test]
    fn test_error_token() {
        nestcfg_testhelpers::setup();
        let error = ParseError::new(ParseErrorKind::SectionsToClose(1), 4);
        let err = build(vec![
            Token::StartSection { key: k("Key") },
            Token::Error(error.clone()),
        ])
        .unwrap_err();
        assert_eq!(err, BuildError::Parse(error));
    }

    #[test]
    fn test_tokens_after_end() {
        nestcfg_testhelpers::setup();
        let mut builder = TreeBuilder::new();
        builder.token(Token::End).unwrap();
        builder.token(Token::End).unwrap();
        assert!(
            builder
                .token(Token::StartSection { key: k("A") })
                .is_err()
        );
    }
}
