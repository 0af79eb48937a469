//! Continuation state shared by the tokenizers.

use std::ops::Range;

use crate::token::{ParseError, ParseErrorKind};

/// Where the tokenizer is in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Between entries: expecting a key, a comment or `}`.
    #[default]
    Section,
    /// After `key:`, expecting the value.
    AfterKey,
    /// `Key` was emitted for a multiline value, `StartMultiline` is next.
    MultilineStart,
    /// Inside the lines of a multiline value.
    Multiline {
        /// The cursor sits on the first content character rather than on a
        /// line break.
        first_line: bool,
    },
    /// Inside an open list.
    List,
    /// Input finished cleanly.
    End,
    /// An error was reported.
    Error,
}

/// Stack of open section and list keys.
///
/// All keys live in one string so a pooled stack stops allocating once it
/// has grown to the deepest nesting it sees. A popped key stays readable
/// until the next push.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeyStack {
    text: String,
    ends: Vec<usize>,
}

impl KeyStack {
    /// Push a key.
    pub(crate) fn push(&mut self, key: &str) {
        self.text.truncate(self.top_end());
        self.text.push_str(key);
        self.ends.push(self.text.len());
    }

    /// Pop the innermost key, returning where its text lives.
    pub(crate) fn pop(&mut self) -> Option<Range<usize>> {
        let end = self.ends.pop()?;
        Some(self.top_end()..end)
    }

    /// Text of a range returned by [`KeyStack::pop`].
    #[inline]
    pub(crate) fn slice(&self, range: Range<usize>) -> &str {
        &self.text[range]
    }

    /// Number of open keys.
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.ends.len()
    }

    /// Whether nothing is open.
    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }

    /// Open keys, outermost first.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        let starts = std::iter::once(0).chain(self.ends.iter().copied());
        starts
            .zip(self.ends.iter().copied())
            .map(|(start, end)| &self.text[start..end])
    }

    /// Forget every key, keeping the capacity.
    pub(crate) fn clear(&mut self) {
        self.text.clear();
        self.ends.clear();
    }

    fn top_end(&self) -> usize {
        self.ends.last().copied().unwrap_or(0)
    }
}

/// Everything a tokenizer needs to resume.
///
/// The buffer tokenizer hands this out through
/// [`BufferTokenizer::into_state`](crate::BufferTokenizer::into_state) and
/// takes it back with a refilled window. It owns a few strings whose capacity
/// is reused, so a state kept around between sessions (see
/// [`ReaderState::reset`]) stops allocating.
#[derive(Debug, Clone)]
pub struct ReaderState {
    pub(crate) mode: Mode,
    pub(crate) stack: KeyStack,
    /// Indentation of the line holding the current key.
    pub(crate) line_indent: String,
    /// Indentation of the value's line; the baseline once multiline.
    pub(crate) multiline_indent: String,
    pub(crate) current_key: String,
    pub(crate) at_line_start: bool,
    /// A line break was crossed between `key:` and the value.
    pub(crate) value_line_break: bool,
    /// Byte position in the current window.
    pub(crate) cursor: usize,
    /// Absolute byte offset of the current window start.
    pub(crate) offset: u64,
    pub(crate) error_offset: u64,
}

impl Default for ReaderState {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderState {
    /// State for the start of a document.
    pub fn new() -> Self {
        Self {
            mode: Mode::Section,
            stack: KeyStack::default(),
            line_indent: String::new(),
            multiline_indent: String::new(),
            current_key: String::new(),
            at_line_start: true,
            value_line_break: false,
            cursor: 0,
            offset: 0,
            error_offset: 0,
        }
    }

    /// Return to the start-of-document state, keeping allocations.
    pub fn reset(&mut self) {
        self.mode = Mode::Section;
        self.stack.clear();
        self.line_indent.clear();
        self.multiline_indent.clear();
        self.current_key.clear();
        self.at_line_start = true;
        self.value_line_break = false;
        self.cursor = 0;
        self.offset = 0;
        self.error_offset = 0;
    }

    /// Current grammar position.
    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Number of open sections and lists.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Keys of the open sections and lists, outermost first.
    pub fn open_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.stack.iter()
    }

    /// Absolute byte offset of the next unconsumed character.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset + self.cursor as u64
    }

    /// Whether `End` or an error has been reached.
    pub fn is_terminal(&self) -> bool {
        matches!(self.mode, Mode::End | Mode::Error)
    }

    pub(crate) fn line_break(&mut self) {
        self.line_indent.clear();
        self.at_line_start = true;
    }

    pub(crate) fn blank(&mut self, c: char) {
        if self.at_line_start {
            self.line_indent.push(c);
        }
    }

    pub(crate) fn begin_value(&mut self, key: &str) {
        self.current_key.clear();
        self.current_key.push_str(key);
        self.multiline_indent.clear();
        self.value_line_break = false;
        self.mode = Mode::AfterKey;
    }

    pub(crate) fn value_break(&mut self) {
        self.value_line_break = true;
        self.multiline_indent.clear();
    }

    pub(crate) fn value_blank(&mut self, c: char) {
        if self.value_line_break {
            self.multiline_indent.push(c);
        }
    }

    /// The value's line is indented deeper than, and under, the key's line.
    pub(crate) fn starts_multiline(&self) -> bool {
        self.value_line_break
            && self.multiline_indent.len() > self.line_indent.len()
            && self.multiline_indent.starts_with(self.line_indent.as_str())
    }

    /// The value starts on a later line: that line is now the current one.
    pub(crate) fn enter_value_line(&mut self, at_line_start: bool) {
        if self.value_line_break {
            self.line_indent.clone_from(&self.multiline_indent);
            self.at_line_start = at_line_start;
        } else {
            self.at_line_start = false;
        }
    }

    pub(crate) fn fail(&mut self, kind: ParseErrorKind, offset: u64) -> ParseError {
        self.mode = Mode::Error;
        self.error_offset = offset;
        ParseError::new(kind, offset)
    }

    pub(crate) fn after_error(&self) -> ParseError {
        ParseError::new(ParseErrorKind::AfterError, self.error_offset)
    }

    /// Input is exhausted at top level.
    pub(crate) fn finish(&mut self, offset: u64) -> Result<(), ParseError> {
        if self.stack.is_empty() {
            self.mode = Mode::End;
            Ok(())
        } else {
            let open = self.stack.len();
            Err(self.fail(ParseErrorKind::SectionsToClose(open), offset))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_stack_push_pop() {
        nestcfg_testhelpers::setup();
        let mut stack = KeyStack::default();
        stack.push("outer");
        stack.push("inner");
        assert_eq!(stack.iter().collect::<Vec<_>>(), vec!["outer", "inner"]);

        let range = stack.pop().unwrap();
        assert_eq!(stack.slice(range), "inner");
        assert_eq!(stack.len(), 1);

        stack.push("next");
        assert_eq!(stack.iter().collect::<Vec<_>>(), vec!["outer", "next"]);

        let range = stack.pop().unwrap();
        assert_eq!(stack.slice(range), "next");
        let range = stack.pop().unwrap();
        assert_eq!(stack.slice(range), "outer");
        assert!(stack.pop().is_none());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_multiline_indent_rule() {
        nestcfg_testhelpers::setup();
        let mut state = ReaderState::new();
        state.line_indent.push('\t');
        state.begin_value("Key");
        state.value_break();
        state.value_blank('\t');
        assert!(!state.starts_multiline(), "same indentation is not deeper");
        state.value_blank(' ');
        assert!(state.starts_multiline());

        state.line_indent.clear();
        state.line_indent.push(' ');
        assert!(!state.starts_multiline(), "deeper but not under the key line");
    }

    #[test]
    fn test_reset_returns_to_start() {
        nestcfg_testhelpers::setup();
        let mut state = ReaderState::new();
        state.stack.push("a");
        state.mode = Mode::List;
        state.offset = 10;
        state.reset();
        assert_eq!(state.mode(), Mode::Section);
        assert_eq!(state.depth(), 0);
        assert_eq!(state.offset(), 0);
        assert!(state.at_line_start);
    }
}
