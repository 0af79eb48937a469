//! Structured nestcfg output writer.
//!
//! The writer turns a sequence of calls into text, one line at a time, and
//! refuses sequences that would not read back as the same structure.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use nestcfg_tokenizer::{Key, Quote};
use nestcfg_tokenizer::syntax::{CLOSE, COMMENT, KEY_SEPARATOR, OPEN, escape};
use tracing::{debug, trace};

use crate::options::WriterOptions;
use crate::scalar::{Encoding, encoding, lines, list_item_encoding};

/// Ids of close tokens, unique across writers.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// What a [`CloseToken`] closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    Section,
    List,
}

/// Proof that a section or list was opened, spent to close it.
///
/// Tokens cannot be cloned, so a construct cannot be closed twice, and the
/// writer checks that they come back innermost first.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an open section or list has to be closed"]
pub struct CloseToken {
    id: u64,
    construct: Construct,
}

impl CloseToken {
    /// What this token closes.
    pub fn construct(&self) -> Construct {
        self.construct
    }
}

/// A sequence of calls that does not describe a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Misuse {
    /// The call is not allowed in the writer's current state.
    OutOfState {
        call: &'static str,
        state: &'static str,
    },
    /// The token does not close the innermost open section or list.
    OutOfOrderClose,
    /// `finish` with sections or lists still open.
    Unclosed(usize),
    /// An earlier call failed.
    Poisoned,
}

impl fmt::Display for Misuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Misuse::OutOfState { call, state } => write!(f, "`{call}` is not allowed {state}"),
            Misuse::OutOfOrderClose => {
                write!(f, "close token does not match the innermost open section or list")
            }
            Misuse::Unclosed(n) => write!(f, "finish called with {n} sections or lists open"),
            Misuse::Poisoned => write!(f, "writer is unusable after an earlier error"),
        }
    }
}

/// Errors from [`Writer`].
#[derive(Debug)]
pub enum WriteError {
    /// Calls out of order. The writer is poisoned.
    Misuse(Misuse),
    /// The indentation unit would not read back as indentation.
    InvalidIndent,
    /// Writing to the output failed. The writer is poisoned.
    Io(io::Error),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::Misuse(misuse) => write!(f, "{misuse}"),
            WriteError::InvalidIndent => write!(
                f,
                "indentation must be non-empty whitespace without line breaks"
            ),
            WriteError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Misuse> for WriteError {
    fn from(misuse: Misuse) -> Self {
        WriteError::Misuse(misuse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Between entries of a section.
    Start,
    /// A key was written, its value is next.
    AfterKey,
    /// Inside a list.
    List,
    /// `finish` succeeded.
    End,
    Poisoned,
}

impl State {
    fn describe(self) -> &'static str {
        match self {
            State::Start => "between entries",
            State::AfterKey => "after a key",
            State::List => "inside a list",
            State::End => "after finish",
            State::Poisoned => "after an error",
        }
    }
}

/// Writes a nestcfg document to an [`io::Write`].
///
/// ```
/// use nestcfg_format::{Newline, Writer, WriterOptions};
/// use nestcfg_tokenizer::Key;
///
/// let options = WriterOptions::new().newline(Newline::Lf);
/// let mut w = Writer::with_options(Vec::new(), options).unwrap();
/// w.key(&Key::new("Server").unwrap()).unwrap();
/// let server = w.open_section().unwrap();
/// w.key(&Key::new("Host").unwrap()).unwrap();
/// w.value("example.org").unwrap();
/// w.close(server).unwrap();
/// w.finish().unwrap();
/// assert_eq!(w.into_inner(), b"Server{\n\tHost:example.org\n}\n");
/// ```
pub struct Writer<W> {
    out: W,
    options: WriterOptions,
    state: State,
    /// Open sections and lists, innermost last.
    open: Vec<(u64, Construct)>,
    /// An empty multiline block was written without its line break.
    pending_empty: bool,
}

impl<W: io::Write> Writer<W> {
    /// Create a new writer with default options.
    pub fn new(out: W) -> Self {
        Self {
            out,
            options: WriterOptions::default(),
            state: State::Start,
            open: Vec::new(),
            pending_empty: false,
        }
    }

    /// Create a new writer with the given options.
    pub fn with_options(out: W, options: WriterOptions) -> Result<Self, WriteError> {
        options.validate()?;
        Ok(Self {
            out,
            options,
            state: State::Start,
            open: Vec::new(),
            pending_empty: false,
        })
    }

    /// The options in use.
    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    /// Number of open sections and lists.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Whether `finish` succeeded.
    pub fn is_finished(&self) -> bool {
        self.state == State::End
    }

    /// Give back the output.
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write the key of the next entry.
    pub fn key(&mut self, key: &Key) -> Result<(), WriteError> {
        self.expect("key", &[State::Start])?;
        let result = self
            .end_empty_block(Some(key))
            .and_then(|()| self.write_key(key));
        self.checked(result, State::AfterKey)
    }

    /// Write the value of the pending key, or an item of the open list.
    pub fn value(&mut self, value: &str) -> Result<(), WriteError> {
        self.expect("value", &[State::AfterKey, State::List])?;
        if self.state == State::List {
            let result = self.write_item(value);
            return self.checked(result, State::List);
        }
        let result = self.write_value(value);
        self.checked(result, State::Start)
    }

    /// Open a section under the pending key.
    pub fn open_section(&mut self) -> Result<CloseToken, WriteError> {
        self.expect("open_section", &[State::AfterKey])?;
        let result = self.write_open(&[OPEN]);
        self.checked(result, State::Start)?;
        Ok(self.push(Construct::Section))
    }

    /// Open a list under the pending key.
    pub fn open_list(&mut self) -> Result<CloseToken, WriteError> {
        self.expect("open_list", &[State::AfterKey])?;
        let result = self.write_open(&[KEY_SEPARATOR, OPEN]);
        self.checked(result, State::List)?;
        Ok(self.push(Construct::List))
    }

    /// Close the innermost open section or list.
    pub fn close(&mut self, token: CloseToken) -> Result<(), WriteError> {
        self.expect("close", &[State::Start, State::List])?;
        let expected = match token.construct {
            Construct::Section => State::Start,
            Construct::List => State::List,
        };
        if self.open.last() != Some(&(token.id, token.construct)) || self.state != expected {
            return Err(self.misuse(Misuse::OutOfOrderClose));
        }
        self.open.pop();
        let result = self.write_close();
        self.checked(result, State::Start)
    }

    /// Write a comment. Each line of `text` becomes a comment line.
    pub fn comment(&mut self, text: &str) -> Result<(), WriteError> {
        self.expect("comment", &[State::Start, State::List])?;
        let result = self.write_comment(text);
        let state = self.state;
        self.checked(result, state)
    }

    /// Check that the document is complete and flush the output.
    pub fn finish(&mut self) -> Result<(), WriteError> {
        self.expect("finish", &[State::Start, State::List])?;
        if !self.open.is_empty() {
            return Err(self.misuse(Misuse::Unclosed(self.open.len())));
        }
        let result = self.end_empty_block(None).and_then(|()| self.out.flush());
        self.checked(result, State::End)
    }

    fn expect(&mut self, call: &'static str, allowed: &[State]) -> Result<(), WriteError> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        let misuse = match self.state {
            State::Poisoned => Misuse::Poisoned,
            state => Misuse::OutOfState {
                call,
                state: state.describe(),
            },
        };
        Err(self.misuse(misuse))
    }

    fn misuse(&mut self, misuse: Misuse) -> WriteError {
        debug!(%misuse, depth = self.open.len(), "writer misuse");
        self.state = State::Poisoned;
        WriteError::Misuse(misuse)
    }

    /// Move to `next` if the write went through, poison otherwise.
    fn checked(&mut self, result: io::Result<()>, next: State) -> Result<(), WriteError> {
        match result {
            Ok(()) => {
                self.state = next;
                Ok(())
            }
            Err(e) => {
                debug!(error = %e, "write failed");
                self.state = State::Poisoned;
                Err(WriteError::Io(e))
            }
        }
    }

    fn push(&mut self, construct: Construct) -> CloseToken {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        self.open.push((id, construct));
        CloseToken { id, construct }
    }

    fn write_indent(&mut self, depth: usize) -> io::Result<()> {
        for _ in 0..depth {
            self.out.write_all(self.options.indent.as_bytes())?;
        }
        Ok(())
    }

    fn write_newline(&mut self) -> io::Result<()> {
        self.out.write_all(self.options.newline.as_str().as_bytes())
    }

    fn write_char(&mut self, c: char) -> io::Result<()> {
        self.out.write_all(c.encode_utf8(&mut [0; 4]).as_bytes())
    }

    fn write_key(&mut self, key: &Key) -> io::Result<()> {
        self.write_indent(self.open.len())?;
        self.out.write_all(key.as_str().as_bytes())
    }

    fn write_open(&mut self, chars: &[char]) -> io::Result<()> {
        for &c in chars {
            self.write_char(c)?;
        }
        self.write_newline()
    }

    fn write_close(&mut self) -> io::Result<()> {
        self.end_empty_block(None)?;
        self.write_indent(self.open.len())?;
        self.write_char(CLOSE)?;
        self.write_newline()
    }

    fn write_quoted(&mut self, value: &str, quote: Quote) -> io::Result<()> {
        self.write_char(quote.as_char())?;
        self.out.write_all(escape(value, quote).as_bytes())?;
        self.write_char(quote.as_char())
    }

    fn write_value(&mut self, value: &str) -> io::Result<()> {
        let encoding = encoding(value, self.options.quote, self.options.multiline);
        trace!(?encoding, len = value.len(), "value");
        self.write_char(KEY_SEPARATOR)?;
        match encoding {
            Encoding::Plain => self.out.write_all(value.as_bytes())?,
            Encoding::Quoted(quote) => self.write_quoted(value, quote)?,
            Encoding::Multiline if value.is_empty() => {
                // The line break waits for the next call: a key starting
                // with a quote would read as this value.
                self.pending_empty = true;
                return Ok(());
            }
            Encoding::Multiline => {
                let depth = self.open.len() + 1;
                self.write_newline()?;
                for (line, newline) in lines(value) {
                    self.write_indent(depth)?;
                    self.out.write_all(line.as_bytes())?;
                    self.out.write_all(newline.as_bytes())?;
                }
            }
        }
        self.write_newline()
    }

    /// End an empty block left open by `write_value`. Before a key starting
    /// with a quote the block becomes an empty quoted value.
    fn end_empty_block(&mut self, next_key: Option<&Key>) -> io::Result<()> {
        if !std::mem::take(&mut self.pending_empty) {
            return Ok(());
        }
        let quote_follows = next_key
            .and_then(|key| key.as_str().chars().next())
            .and_then(Quote::from_char)
            .is_some();
        if quote_follows {
            self.write_quoted("", self.options.quote.quote())?;
        }
        self.write_newline()
    }

    fn write_item(&mut self, value: &str) -> io::Result<()> {
        let encoding = list_item_encoding(value, self.options.quote);
        trace!(?encoding, len = value.len(), "list item");
        self.write_indent(self.open.len())?;
        match encoding {
            Encoding::Quoted(quote) => self.write_quoted(value, quote)?,
            Encoding::Plain | Encoding::Multiline => self.out.write_all(value.as_bytes())?,
        }
        self.write_newline()
    }

    fn write_comment(&mut self, text: &str) -> io::Result<()> {
        self.end_empty_block(None)?;
        for (line, _) in lines(text) {
            self.write_indent(self.open.len())?;
            self.write_char(COMMENT)?;
            self.out.write_all(line.as_bytes())?;
            self.write_newline()?;
        }
        Ok(())
    }
}
