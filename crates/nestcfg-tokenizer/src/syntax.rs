//! Reserved characters, quoting and key validation for nestcfg.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Opens a section after a key, or a list after `key:`.
pub const OPEN: char = '{';
/// Closes a section or a list.
pub const CLOSE: char = '}';
/// Separates a key from its value.
pub const KEY_SEPARATOR: char = ':';
/// Starts a comment running to the end of the line.
pub const COMMENT: char = '#';

/// Characters that may never appear inside a key.
pub const RESERVED: [char; 6] = [OPEN, CLOSE, KEY_SEPARATOR, COMMENT, '\n', '\r'];

/// Characters that force a value to be quoted when they start it.
pub const VALUE_START_RESERVED: [char; 5] = [OPEN, CLOSE, COMMENT, '"', '\''];

/// Whether `c` is one of the reserved key characters.
#[inline]
pub fn is_reserved(c: char) -> bool {
    RESERVED.contains(&c)
}

/// Whether `c` ends a line.
#[inline]
pub fn is_line_break(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// Whitespace that is not a line break.
#[inline]
pub fn is_blank(c: char) -> bool {
    c.is_whitespace() && !is_line_break(c)
}

/// Byte index of the first line break in `s`.
#[inline]
pub fn find_line_break(s: &str) -> Option<usize> {
    s.find(is_line_break)
}

/// The two quote characters of the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quote {
    /// `"`
    Double,
    /// `'`
    Single,
}

impl Quote {
    /// The quote for `c`, if it is one.
    pub fn from_char(c: char) -> Option<Quote> {
        match c {
            '"' => Some(Quote::Double),
            '\'' => Some(Quote::Single),
            _ => None,
        }
    }

    /// The character written for this quote.
    pub fn as_char(self) -> char {
        match self {
            Quote::Double => '"',
            Quote::Single => '\'',
        }
    }

    fn doubled(self) -> &'static str {
        match self {
            Quote::Double => "\"\"",
            Quote::Single => "''",
        }
    }
}

/// Double every occurrence of `quote` in `s`.
///
/// The result goes between two `quote` characters.
pub fn escape(s: &str, quote: Quote) -> Cow<'_, str> {
    let q = quote.as_char();
    if !s.contains(q) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 2);
    for c in s.chars() {
        if c == q {
            out.push_str(quote.doubled());
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Collapse every doubled `quote` in `raw` into a single one.
pub fn unescape(raw: &str, quote: Quote) -> Cow<'_, str> {
    let doubled = quote.doubled();
    if !raw.contains(doubled) {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(raw.replace(doubled, &doubled[..1]))
}

/// Why a string was rejected as a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key was empty.
    Empty,
    /// The key only contained whitespace.
    Whitespace,
    /// The key contained a reserved character.
    ReservedCharacter(char),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::Empty => write!(f, "a key cannot be empty"),
            KeyError::Whitespace => write!(f, "a key cannot consist only of whitespace"),
            KeyError::ReservedCharacter(c) => {
                write!(f, "a key cannot contain the reserved character {c:?}")
            }
        }
    }
}

impl std::error::Error for KeyError {}

/// Check `s` against the key rules without allocating.
pub fn validate_key(s: &str) -> Result<(), KeyError> {
    if s.is_empty() {
        return Err(KeyError::Empty);
    }
    if let Some(c) = s.chars().find(|&c| is_reserved(c)) {
        return Err(KeyError::ReservedCharacter(c));
    }
    if s.chars().all(char::is_whitespace) {
        return Err(KeyError::Whitespace);
    }
    Ok(())
}

/// A validated key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(String);

impl Key {
    /// Validate `key` and wrap it.
    pub fn new(key: impl Into<String>) -> Result<Key, KeyError> {
        let key = key.into();
        validate_key(&key)?;
        Ok(Key(key))
    }

    /// The key text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap the key text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Key {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Key {
    type Error = KeyError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Key::new(value)
    }
}

impl TryFrom<String> for Key {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Key::new(value)
    }
}

impl FromStr for Key {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Key::new(s)
    }
}
