//! Drives a [`BufferTokenizer`] from a byte reader.

use std::borrow::Cow;
use std::io::{self, Read};
use std::mem;

use tracing::debug;

use crate::buffer::BufferTokenizer;
use crate::state::ReaderState;
use crate::token::{ParseError, ParseErrorKind, Text, Token};

/// Sizing of the byte buffer of a [`BufferedTokenizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferOptions {
    /// Size of the buffer before any token needed more room.
    pub initial_capacity: usize,
    /// Largest size the buffer may grow to. A token that does not fit is an
    /// error.
    pub max_capacity: usize,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 4096,
            max_capacity: isize::MAX as usize,
        }
    }
}

impl BufferOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the starting buffer size.
    pub fn initial_capacity(mut self, bytes: usize) -> Self {
        self.initial_capacity = bytes;
        self
    }

    /// Set the largest buffer size.
    pub fn max_capacity(mut self, bytes: usize) -> Self {
        self.max_capacity = bytes;
        self
    }
}

/// How the buffered bytes end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    /// Every byte is part of the window.
    Complete,
    /// A sequence is cut short and may complete with more bytes.
    Incomplete,
    /// The bytes after the window are not UTF-8.
    Invalid,
}

/// Longest valid UTF-8 prefix of `bytes`.
fn utf8_prefix(bytes: &[u8]) -> (&str, Tail) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (s, Tail::Complete),
        Err(e) => {
            let tail = match e.error_len() {
                Some(_) => Tail::Invalid,
                None => Tail::Incomplete,
            };
            let prefix = std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default();
            (prefix, tail)
        }
    }
}

/// Tokenizes a reader through a reusable, growable byte buffer.
///
/// Tokens are owned and multiline values are folded into one
/// [`Token::Value`], so the output is the same as the
/// [`StreamTokenizer`](crate::StreamTokenizer)'s for the same input.
pub struct BufferedTokenizer<R> {
    reader: R,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
    state: ReaderState,
    options: BufferOptions,
    /// Key and text of a multiline value being folded.
    multiline: Option<(String, String)>,
    done: bool,
}

impl<R: Read> BufferedTokenizer<R> {
    /// Create a new tokenizer with default options.
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, BufferOptions::default())
    }

    /// Create a new tokenizer with the given options.
    pub fn with_options(reader: R, options: BufferOptions) -> Self {
        Self::with_parts(reader, Vec::new(), ReaderState::new(), options)
    }

    /// Build from the parts of a previous tokenizer, keeping their
    /// allocations. The buffer contents and the state are cleared.
    pub fn with_parts(
        reader: R,
        mut buf: Vec<u8>,
        mut state: ReaderState,
        options: BufferOptions,
    ) -> Self {
        let size = buf
            .capacity()
            .max(options.initial_capacity)
            .min(options.max_capacity)
            .max(1);
        buf.clear();
        buf.resize(size, 0);
        state.reset();
        Self {
            reader,
            buf,
            start: 0,
            end: 0,
            eof: false,
            state,
            options,
            multiline: None,
            done: false,
        }
    }

    /// Take the reader, buffer and state apart for reuse.
    pub fn into_parts(self) -> (R, Vec<u8>, ReaderState) {
        (self.reader, self.buf, self.state)
    }

    /// The continuation state.
    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    /// Current size of the byte buffer.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Get the next token. Never returns [`Token::NeedMoreData`].
    pub fn next_token(&mut self) -> Token<'static> {
        loop {
            match self.pump() {
                Token::Key { key } => self.multiline = Some((key.into_owned(), String::new())),
                Token::StartMultiline => {}
                Token::Value { text, .. } if self.multiline.is_some() => {
                    if let Some((_, folded)) = &mut self.multiline {
                        folded.push_str(&text.newline);
                        folded.push_str(&text.raw);
                    }
                }
                Token::EndMultiline => {
                    if let Some((key, folded)) = self.multiline.take() {
                        return Token::Value {
                            key: Cow::Owned(key),
                            text: Text::plain(folded),
                        };
                    }
                }
                token => return token,
            }
        }
    }

    /// Next token of the underlying buffer tokenizer, refilling as needed.
    fn pump(&mut self) -> Token<'static> {
        loop {
            let (window, tail) = utf8_prefix(&self.buf[self.start..self.end]);
            let window_len = window.len();
            let is_final = self.eof && tail == Tail::Complete;

            let state = mem::take(&mut self.state);
            let mut tokenizer = BufferTokenizer::new(window, is_final, state);
            let token = tokenizer.next_token().into_owned();
            let consumed = tokenizer.consumed();
            self.state = tokenizer.into_state();
            self.start += consumed;

            if token != Token::NeedMoreData {
                return token;
            }
            if tail == Tail::Invalid || (tail == Tail::Incomplete && self.eof) {
                let offset = self.state.offset() + (window_len - consumed) as u64;
                return Token::Error(self.state.fail(ParseErrorKind::InvalidUtf8, offset));
            }
            if let Err(err) = self.refill() {
                return Token::Error(err);
            }
        }
    }

    /// Move the unconsumed bytes to the front and read more behind them.
    fn refill(&mut self) -> Result<(), ParseError> {
        if self.start > 0 {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        if self.end == self.buf.len() {
            self.grow()?;
        }
        loop {
            match self.reader.read(&mut self.buf[self.end..]) {
                Ok(0) => {
                    debug!(offset = self.state.offset(), "end of input");
                    self.eof = true;
                    return Ok(());
                }
                Ok(n) => {
                    debug!(bytes = n, buffered = self.end + n, "refilled");
                    self.end += n;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    let offset = self.state.offset() + self.end as u64;
                    return Err(self.state.fail(ParseErrorKind::Io(e.to_string()), offset));
                }
            }
        }
    }

    fn grow(&mut self) -> Result<(), ParseError> {
        let len = self.buf.len();
        if len >= self.options.max_capacity {
            let offset = self.state.offset();
            debug!(len, offset, "token does not fit in the largest buffer");
            return Err(self.state.fail(ParseErrorKind::TokenTooLarge, offset));
        }
        let new_len = len.saturating_mul(2).clamp(1, self.options.max_capacity);
        debug!(from = len, to = new_len, "growing buffer");
        self.buf.resize(new_len, 0);
        Ok(())
    }
}

impl<R: Read> Iterator for BufferedTokenizer<R> {
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
