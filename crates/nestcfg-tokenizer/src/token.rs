//! Token types produced by the nestcfg tokenizers.

use std::borrow::Cow;
use std::fmt;

use crate::syntax::{Quote, unescape};

/// Text carried by a value, list value or multiline line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text<'a> {
    /// Content as it appears in the source; doubled quotes are still doubled.
    pub raw: Cow<'a, str>,
    /// The enclosing quote, if the text was quoted.
    pub quote: Option<Quote>,
    /// Line break preceding a multiline line (empty for the first line and
    /// for every non-multiline text).
    pub newline: Cow<'a, str>,
}

impl<'a> Text<'a> {
    /// Unquoted text.
    pub fn plain(raw: impl Into<Cow<'a, str>>) -> Self {
        Self {
            raw: raw.into(),
            quote: None,
            newline: Cow::Borrowed(""),
        }
    }

    /// Quoted text; `raw` is the content between the quotes.
    pub fn quoted(raw: impl Into<Cow<'a, str>>, quote: Quote) -> Self {
        Self {
            raw: raw.into(),
            quote: Some(quote),
            newline: Cow::Borrowed(""),
        }
    }

    /// One line of a multiline value.
    pub fn line(newline: impl Into<Cow<'a, str>>, raw: impl Into<Cow<'a, str>>) -> Self {
        Self {
            raw: raw.into(),
            quote: None,
            newline: newline.into(),
        }
    }

    /// The logical content, with doubled quotes collapsed.
    pub fn unescaped(&self) -> Cow<'_, str> {
        match self.quote {
            Some(quote) => unescape(&self.raw, quote),
            None => Cow::Borrowed(&self.raw),
        }
    }

    /// Detach from the source window.
    pub fn into_owned(self) -> Text<'static> {
        Text {
            raw: Cow::Owned(self.raw.into_owned()),
            quote: self.quote,
            newline: Cow::Owned(self.newline.into_owned()),
        }
    }
}

/// A structural token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// The key of a value that follows as a multiline block.
    Key { key: Cow<'a, str> },
    /// A scalar value, or one line of a multiline block.
    Value { key: Cow<'a, str>, text: Text<'a> },
    /// A comment, without the leading `#`.
    Comment { text: Cow<'a, str> },
    /// `key:{`
    StartList { key: Cow<'a, str> },
    /// An item of the open list.
    ListValue { text: Text<'a> },
    /// `}` closing a list.
    EndList { key: Cow<'a, str> },
    /// `key{`
    StartSection { key: Cow<'a, str> },
    /// `}` closing a section.
    EndSection { key: Cow<'a, str> },
    /// Start of the lines of a multiline value.
    StartMultiline,
    /// End of the lines of a multiline value.
    EndMultiline,
    /// The window ended before the next token could be decided.
    NeedMoreData,
    /// End of input with every section closed.
    End,
    /// Malformed input. Terminal.
    Error(ParseError),
}

impl Token<'_> {
    /// Whether no further tokens will follow.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Token::End | Token::Error(_))
    }

    /// Detach from the source window.
    pub fn into_owned(self) -> Token<'static> {
        fn own(s: Cow<'_, str>) -> Cow<'static, str> {
            Cow::Owned(s.into_owned())
        }

        match self {
            Token::Key { key } => Token::Key { key: own(key) },
            Token::Value { key, text } => Token::Value {
                key: own(key),
                text: text.into_owned(),
            },
            Token::Comment { text } => Token::Comment { text: own(text) },
            Token::StartList { key } => Token::StartList { key: own(key) },
            Token::ListValue { text } => Token::ListValue {
                text: text.into_owned(),
            },
            Token::EndList { key } => Token::EndList { key: own(key) },
            Token::StartSection { key } => Token::StartSection { key: own(key) },
            Token::EndSection { key } => Token::EndSection { key: own(key) },
            Token::StartMultiline => Token::StartMultiline,
            Token::EndMultiline => Token::EndMultiline,
            Token::NeedMoreData => Token::NeedMoreData,
            Token::End => Token::End,
            Token::Error(err) => Token::Error(err),
        }
    }
}

/// What went wrong while tokenizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Input ended with sections still open.
    SectionsToClose(usize),
    /// `}` at top level with no open section.
    UnmatchedSectionClose,
    /// `}`, `#` or a line break before a key's `:` or `{`.
    InvalidKeyCharacter,
    /// A key with nothing but whitespace before its terminator.
    EmptyKey,
    /// Input ended before a key's `:` or `{`.
    EofInKey,
    /// Input ended inside a quoted string.
    EofInQuoted,
    /// Input ended inside an open list.
    EofInList,
    /// The input was not valid UTF-8.
    InvalidUtf8,
    /// A single token did not fit in the largest allowed buffer.
    TokenTooLarge,
    /// Reading the source failed.
    Io(String),
    /// Returned by every call after the first error.
    AfterError,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::SectionsToClose(n) => {
                write!(f, "end of stream reached with {n} sections to close")
            }
            ParseErrorKind::UnmatchedSectionClose => {
                write!(f, "section close when there was no section to close")
            }
            ParseErrorKind::InvalidKeyCharacter => {
                write!(f, "invalid character in the middle of a key")
            }
            ParseErrorKind::EmptyKey => write!(f, "a key cannot be empty"),
            ParseErrorKind::EofInKey => write!(f, "end of stream reading a key"),
            ParseErrorKind::EofInQuoted => write!(f, "end of stream reading a quoted string"),
            ParseErrorKind::EofInList => write!(f, "end of stream inside a list"),
            ParseErrorKind::InvalidUtf8 => write!(f, "invalid UTF-8 in input"),
            ParseErrorKind::TokenTooLarge => {
                write!(f, "token exceeds the maximum buffer size")
            }
            ParseErrorKind::Io(msg) => write!(f, "I/O error: {msg}"),
            ParseErrorKind::AfterError => write!(f, "cannot read further after an error"),
        }
    }
}

/// A tokenizer error with the byte offset it refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The kind of error.
    pub kind: ParseErrorKind,
    /// Absolute byte offset in the input.
    pub offset: u64,
}

impl ParseError {
    /// Create a new parse error.
    pub fn new(kind: ParseErrorKind, offset: u64) -> Self {
        Self { kind, offset }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at offset {}", self.kind, self.offset)
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescaped_text() {
        nestcfg_testhelpers::setup();
        assert_eq!(Text::plain("a\"\"b").unescaped(), "a\"\"b");
        assert_eq!(Text::quoted("a\"\"b", Quote::Double).unescaped(), "a\"b");
        assert_eq!(Text::quoted("a''b", Quote::Single).unescaped(), "a'b");
    }

    #[test]
    fn test_error_messages() {
        nestcfg_testhelpers::setup();
        let err = ParseError::new(ParseErrorKind::SectionsToClose(1), 4);
        assert_eq!(
            err.to_string(),
            "end of stream reached with 1 sections to close at offset 4"
        );
        assert_eq!(
            ParseErrorKind::UnmatchedSectionClose.to_string(),
            "section close when there was no section to close"
        );
    }

    #[test]
    fn test_into_owned_keeps_content() {
        nestcfg_testhelpers::setup();
        let source = String::from("value");
        let token = Token::Value {
            key: Cow::Borrowed(&source[..3]),
            text: Text::line("\n", &source[..]),
        };
        let owned = token.clone().into_owned();
        drop(source);
        assert_eq!(
            owned,
            Token::Value {
                key: Cow::Owned("val".to_string()),
                text: Text::line("\n".to_string(), "value".to_string()),
            }
        );
    }
}
