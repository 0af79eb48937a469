//! Tokenizer pulling characters one at a time from a source.

use std::borrow::Cow;
use std::io::{self, Read};

use tracing::trace;

use crate::state::{Mode, ReaderState};
use crate::syntax::{CLOSE, COMMENT, KEY_SEPARATOR, OPEN, Quote, is_line_break};
use crate::token::{ParseError, ParseErrorKind, Text, Token};

/// A source of characters.
pub trait CharSource {
    /// The next character, or `None` at the end of input.
    ///
    /// Invalid input is reported as an error of kind
    /// [`io::ErrorKind::InvalidData`].
    fn next_char(&mut self) -> io::Result<Option<char>>;
}

/// Characters of a string.
#[derive(Debug, Clone)]
pub struct StrSource<'a> {
    chars: std::str::Chars<'a>,
}

impl<'a> StrSource<'a> {
    /// Create a new source over `source`.
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars(),
        }
    }
}

impl CharSource for StrSource<'_> {
    #[inline]
    fn next_char(&mut self) -> io::Result<Option<char>> {
        Ok(self.chars.next())
    }
}

/// Decodes UTF-8 from a byte reader.
#[derive(Debug)]
pub struct Utf8Reader<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    len: usize,
}

impl<R: Read> Utf8Reader<R> {
    const CAPACITY: usize = 8 * 1024;

    /// Create a new reader decoding `inner`.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: vec![0; Self::CAPACITY].into_boxed_slice(),
            pos: 0,
            len: 0,
        }
    }

    /// Unwrap the reader. Bytes read ahead are lost.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Make sure at least `need` bytes are buffered. `false` at end of input.
    fn fill(&mut self, need: usize) -> io::Result<bool> {
        while self.len - self.pos < need {
            if self.pos > 0 {
                self.buf.copy_within(self.pos..self.len, 0);
                self.len -= self.pos;
                self.pos = 0;
            }
            match self.inner.read(&mut self.buf[self.len..]) {
                Ok(0) => return Ok(false),
                Ok(n) => self.len += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

fn invalid_utf8() -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8")
}

/// Length of the sequence started by `lead`, zero if it cannot start one.
fn sequence_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

impl<R: Read> CharSource for Utf8Reader<R> {
    fn next_char(&mut self) -> io::Result<Option<char>> {
        if !self.fill(1)? {
            return Ok(None);
        }
        let width = sequence_len(self.buf[self.pos]);
        if width == 0 || !self.fill(width)? {
            return Err(invalid_utf8());
        }
        let bytes = &self.buf[self.pos..self.pos + width];
        let c = std::str::from_utf8(bytes)
            .map_err(|_| invalid_utf8())?
            .chars()
            .next()
            .ok_or_else(invalid_utf8)?;
        self.pos += width;
        Ok(Some(c))
    }
}

/// A tokenizer reading from a [`CharSource`].
///
/// Follows the same grammar as [`BufferTokenizer`](crate::BufferTokenizer)
/// but blocks on its source instead of asking for more data, and reads a
/// multiline value into a single [`Token::Value`] whose text joins the lines
/// with their original line breaks.
pub struct StreamTokenizer<S> {
    source: S,
    pushback: Option<char>,
    state: ReaderState,
    done: bool,
}

impl<'a> StreamTokenizer<StrSource<'a>> {
    /// Tokenize a string.
    pub fn from_text(source: &'a str) -> Self {
        Self::new(StrSource::new(source))
    }
}

impl<R: Read> StreamTokenizer<Utf8Reader<R>> {
    /// Tokenize UTF-8 bytes from a reader.
    pub fn from_reader(reader: R) -> Self {
        Self::new(Utf8Reader::new(reader))
    }
}

impl<S: CharSource> StreamTokenizer<S> {
    /// Create a new tokenizer pulling from `source`.
    pub fn new(source: S) -> Self {
        Self::with_state(source, ReaderState::new())
    }

    /// Tokenize `source` reusing the allocations of a previous state.
    pub fn with_state(source: S, mut state: ReaderState) -> Self {
        state.reset();
        Self {
            source,
            pushback: None,
            state,
            done: false,
        }
    }

    /// The continuation state; its offset is the number of bytes read.
    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    /// Take the source and the state apart for reuse.
    pub fn into_parts(self) -> (S, ReaderState) {
        (self.source, self.state)
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Token<'static> {
        let result = match self.state.mode {
            Mode::End => Ok(Token::End),
            Mode::Error => Err(self.state.after_error()),
            Mode::List => self.list(),
            // Values are read within the call that read their key.
            Mode::Section | Mode::AfterKey | Mode::MultilineStart | Mode::Multiline { .. } => {
                self.section()
            }
        };
        let token = result.unwrap_or_else(Token::Error);
        trace!("Token {:?}", token);
        token
    }

    fn read(&mut self) -> Result<Option<char>, ParseError> {
        let next = match self.pushback.take() {
            Some(c) => Some(c),
            None => match self.source.next_char() {
                Ok(c) => c,
                Err(e) => {
                    let kind = if e.kind() == io::ErrorKind::InvalidData {
                        ParseErrorKind::InvalidUtf8
                    } else {
                        ParseErrorKind::Io(e.to_string())
                    };
                    let offset = self.state.offset;
                    return Err(self.state.fail(kind, offset));
                }
            },
        };
        if let Some(c) = next {
            self.state.offset += c.len_utf8() as u64;
        }
        Ok(next)
    }

    fn unread(&mut self, c: char) {
        debug_assert!(self.pushback.is_none());
        self.state.offset -= c.len_utf8() as u64;
        self.pushback = Some(c);
    }

    /// Offset of a character just read.
    fn start_of(&self, c: char) -> u64 {
        self.state.offset - c.len_utf8() as u64
    }

    fn fail(&mut self, kind: ParseErrorKind, offset: u64) -> ParseError {
        self.state.fail(kind, offset)
    }

    /// Read up to the next line break, leaving it unread.
    ///
    /// Returns whether a line break was found before the end of input.
    fn read_line(&mut self, out: &mut String) -> Result<bool, ParseError> {
        while let Some(c) = self.read()? {
            if is_line_break(c) {
                self.unread(c);
                return Ok(true);
            }
            out.push(c);
        }
        Ok(false)
    }

    /// Content of a quoted string whose opening quote was read.
    fn quoted(&mut self, quote: Quote, start: u64) -> Result<String, ParseError> {
        let q = quote.as_char();
        let mut raw = String::new();
        loop {
            match self.read()? {
                None => return Err(self.fail(ParseErrorKind::EofInQuoted, start)),
                Some(c) if c == q => match self.read()? {
                    Some(next) if next == q => {
                        raw.push(q);
                        raw.push(q);
                    }
                    Some(next) => {
                        self.unread(next);
                        return Ok(raw);
                    }
                    None => return Ok(raw),
                },
                Some(c) => raw.push(c),
            }
        }
    }

    fn value(&self, text: Text<'static>) -> Token<'static> {
        Token::Value {
            key: Cow::Owned(self.state.current_key.clone()),
            text,
        }
    }

    fn section(&mut self) -> Result<Token<'static>, ParseError> {
        let c = loop {
            let Some(c) = self.read()? else {
                let end = self.state.offset;
                self.state.finish(end)?;
                return Ok(Token::End);
            };
            if !c.is_whitespace() {
                break c;
            }
            if is_line_break(c) {
                self.state.line_break();
            } else {
                self.state.blank(c);
            }
        };

        let start = self.start_of(c);
        match c {
            COMMENT => {
                let mut text = String::new();
                self.read_line(&mut text)?;
                self.state.at_line_start = false;
                Ok(Token::Comment {
                    text: Cow::Owned(text),
                })
            }
            CLOSE => {
                let Some(range) = self.state.stack.pop() else {
                    return Err(self.fail(ParseErrorKind::UnmatchedSectionClose, start));
                };
                self.state.at_line_start = false;
                Ok(Token::EndSection {
                    key: Cow::Owned(self.state.stack.slice(range).to_string()),
                })
            }
            _ => self.key(c, start),
        }
    }

    fn key(&mut self, first: char, start: u64) -> Result<Token<'static>, ParseError> {
        let mut key = String::new();
        let mut next = Some(first);
        let terminator = loop {
            let Some(c) = next else {
                return Err(self.fail(ParseErrorKind::EofInKey, start));
            };
            match c {
                KEY_SEPARATOR | OPEN => break c,
                CLOSE | COMMENT | '\n' | '\r' => {
                    return Err(self.fail(ParseErrorKind::InvalidKeyCharacter, start));
                }
                _ => key.push(c),
            }
            next = self.read()?;
        };

        key.truncate(key.trim_end().len());
        if key.is_empty() {
            return Err(self.fail(ParseErrorKind::EmptyKey, start));
        }
        self.state.at_line_start = false;

        if terminator == OPEN {
            self.state.stack.push(&key);
            return Ok(Token::StartSection {
                key: Cow::Owned(key),
            });
        }
        self.state.begin_value(&key);
        self.after_key()
    }

    fn after_key(&mut self) -> Result<Token<'static>, ParseError> {
        let c = loop {
            let Some(c) = self.read()? else {
                self.state.enter_value_line(true);
                self.state.mode = Mode::Section;
                return Ok(self.value(Text::plain("")));
            };
            if !c.is_whitespace() {
                break c;
            }
            if is_line_break(c) {
                self.state.value_break();
            } else {
                self.state.value_blank(c);
            }
        };

        let start = self.start_of(c);
        if c == OPEN {
            self.state.enter_value_line(false);
            self.state.stack.push(&self.state.current_key);
            self.state.mode = Mode::List;
            return Ok(Token::StartList {
                key: Cow::Owned(self.state.current_key.clone()),
            });
        }

        if let Some(quote) = Quote::from_char(c) {
            let raw = self.quoted(quote, start)?;
            self.state.enter_value_line(false);
            self.state.mode = Mode::Section;
            return Ok(self.value(Text::quoted(raw, quote)));
        }

        self.state.mode = Mode::Section;
        if self.state.value_line_break {
            self.unread(c);
            if self.state.starts_multiline() {
                let text = self.multiline()?;
                return Ok(self.value(Text::plain(text)));
            }
            self.state.enter_value_line(true);
            return Ok(self.value(Text::plain("")));
        }

        let mut raw = String::from(c);
        self.read_line(&mut raw)?;
        raw.truncate(raw.trim_end().len());
        self.state.enter_value_line(false);
        Ok(self.value(Text::plain(raw)))
    }

    /// Read the lines of a multiline value. The first line starts at the
    /// next character.
    fn multiline(&mut self) -> Result<String, ParseError> {
        let mut text = String::new();
        self.read_line(&mut text)?;
        loop {
            // Positioned on a line break or at the end of input.
            let Some(first) = self.read()? else {
                return Ok(text);
            };
            let mut newline = String::from(first);
            if first == '\r' {
                match self.read()? {
                    Some('\n') => newline.push('\n'),
                    Some(other) => self.unread(other),
                    None => {}
                }
            }

            let baseline = self.state.multiline_indent.len();
            let mut matched = 0;
            let mut pending = None;
            while matched < baseline {
                match self.read()? {
                    Some(c) if self.state.multiline_indent[matched..].starts_with(c) => {
                        matched += c.len_utf8();
                    }
                    other => {
                        pending = other;
                        break;
                    }
                }
            }

            if matched == baseline {
                text.push_str(&newline);
                self.read_line(&mut text)?;
                continue;
            }

            // Not indented under the value: the line belongs to the section,
            // with what matched so far as its indentation.
            self.state.line_break();
            self.state
                .line_indent
                .push_str(&self.state.multiline_indent[..matched]);
            if let Some(c) = pending {
                self.unread(c);
            }
            return Ok(text);
        }
    }

    fn list(&mut self) -> Result<Token<'static>, ParseError> {
        let c = loop {
            let Some(c) = self.read()? else {
                let end = self.state.offset;
                return Err(self.fail(ParseErrorKind::EofInList, end));
            };
            if !c.is_whitespace() {
                break c;
            }
            if is_line_break(c) {
                self.state.line_break();
            } else {
                self.state.blank(c);
            }
        };

        let start = self.start_of(c);
        self.state.at_line_start = false;
        match c {
            CLOSE => {
                let Some(range) = self.state.stack.pop() else {
                    return Err(self.fail(ParseErrorKind::UnmatchedSectionClose, start));
                };
                self.state.mode = Mode::Section;
                Ok(Token::EndList {
                    key: Cow::Owned(self.state.stack.slice(range).to_string()),
                })
            }
            COMMENT => {
                let mut text = String::new();
                if !self.read_line(&mut text)? {
                    return Err(self.fail(ParseErrorKind::EofInList, start));
                }
                Ok(Token::Comment {
                    text: Cow::Owned(text),
                })
            }
            _ => {
                if let Some(quote) = Quote::from_char(c) {
                    let raw = self.quoted(quote, start)?;
                    return Ok(Token::ListValue {
                        text: Text::quoted(raw, quote),
                    });
                }
                let mut raw = String::from(c);
                if !self.read_line(&mut raw)? {
                    return Err(self.fail(ParseErrorKind::EofInList, start));
                }
                raw.truncate(raw.trim_end().len());
                Ok(Token::ListValue {
                    text: Text::plain(raw),
                })
            }
        }
    }
}

impl<S: CharSource> Iterator for StreamTokenizer<S> {
    type Item = Token<'static>;

    fn next(&mut self) -> Option<Token<'static>> {
        if self.done {
            return None;
        }
        match self.next_token() {
            Token::End => {
                self.done = true;
                None
            }
            token @ Token::Error(_) => {
                self.done = true;
                Some(token)
            }
            token => Some(token),
        }
    }
}
