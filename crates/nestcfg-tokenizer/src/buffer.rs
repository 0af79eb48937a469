//! Tokenizer over a caller-owned window of text.

use std::borrow::Cow;

use tracing::trace;

use crate::state::{Mode, ReaderState};
use crate::syntax::{CLOSE, COMMENT, KEY_SEPARATOR, OPEN, Quote, find_line_break, is_line_break};
use crate::token::{ParseError, ParseErrorKind, Text, Token};

/// A tokenizer over one window of input.
///
/// The window may be a prefix of the whole document. Whenever a token could
/// continue past the end of a window that is not final, [`Token::NeedMoreData`]
/// is returned and nothing of that token is consumed. The caller then keeps
/// `window[consumed()..]`, appends more input behind it and continues with
/// `BufferTokenizer::new(refilled, is_final, tokenizer.into_state())`.
///
/// Multiline values come out as `Key`, `StartMultiline`, one `Value` per line
/// and `EndMultiline`, so that no line has to be held across refills.
pub struct BufferTokenizer<'a> {
    window: &'a str,
    is_final: bool,
    state: ReaderState,
}

impl<'a> BufferTokenizer<'a> {
    /// Tokenize `window`, resuming from `state`.
    ///
    /// Pass `is_final` when no input follows the window.
    pub fn new(window: &'a str, is_final: bool, state: ReaderState) -> Self {
        debug_assert!(state.cursor <= window.len());
        Self {
            window,
            is_final,
            state,
        }
    }

    /// Tokenize a complete document held in memory.
    pub fn complete(source: &'a str) -> Self {
        Self::new(source, true, ReaderState::new())
    }

    /// Bytes of the window consumed so far.
    #[inline]
    pub fn consumed(&self) -> usize {
        self.state.cursor
    }

    /// The continuation state.
    #[inline]
    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    /// Whether the window is the end of the input.
    #[inline]
    pub fn is_final(&self) -> bool {
        self.is_final
    }

    /// Give up the window and keep the continuation.
    ///
    /// The returned state expects the next window to start at the first
    /// unconsumed byte of this one.
    pub fn into_state(mut self) -> ReaderState {
        self.state.offset += self.state.cursor as u64;
        self.state.cursor = 0;
        self.state
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Token<'_> {
        let result = match self.state.mode {
            Mode::Section => self.section(),
            Mode::AfterKey => self.after_key(),
            Mode::MultilineStart => {
                self.state.mode = Mode::Multiline { first_line: true };
                Ok(Token::StartMultiline)
            }
            Mode::Multiline { first_line: true } => self.first_line(),
            Mode::Multiline { first_line: false } => self.next_line(),
            Mode::List => self.list(),
            Mode::End => Ok(Token::End),
            Mode::Error => Err(self.state.after_error()),
        };
        let token = result.unwrap_or_else(Token::Error);
        trace!("Token {:?}", token);
        token
    }

    #[inline]
    fn peek(&self) -> Option<char> {
        self.window[self.state.cursor..].chars().next()
    }

    /// Absolute offset of a window position.
    #[inline]
    fn at(&self, pos: usize) -> u64 {
        self.state.offset + pos as u64
    }

    fn fail(&mut self, kind: ParseErrorKind, pos: usize) -> ParseError {
        let offset = self.at(pos);
        self.state.fail(kind, offset)
    }

    /// End of the line starting at `from`, if the window can tell.
    fn line_end(&self, from: usize) -> Option<usize> {
        match find_line_break(&self.window[from..]) {
            Some(len) => Some(from + len),
            None if self.is_final => Some(self.window.len()),
            None => None,
        }
    }

    /// Position of the quote closing the string opened at `open`.
    ///
    /// `None` when the window ends first, including when it ends right after
    /// a quote that might be the first half of a doubled one.
    fn closing_quote(&self, open: usize, quote: Quote) -> Option<usize> {
        let q = quote.as_char();
        let mut from = open + 1;
        loop {
            let at = from + self.window[from..].find(q)?;
            match self.window[at + 1..].chars().next() {
                Some(next) if next == q => from = at + 2,
                Some(_) => return Some(at),
                None if self.is_final => return Some(at),
                None => return None,
            }
        }
    }

    fn value(&self, text: Text<'a>) -> Token<'_> {
        Token::Value {
            key: Cow::Borrowed(&self.state.current_key),
            text,
        }
    }

    fn section(&mut self) -> Result<Token<'_>, ParseError> {
        let window = self.window;
        let c = loop {
            let Some(c) = self.peek() else {
                if !self.is_final {
                    return Ok(Token::NeedMoreData);
                }
                let end = self.at(self.state.cursor);
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
            self.state.cursor += c.len_utf8();
        };

        let start = self.state.cursor;
        match c {
            COMMENT => {
                let Some(end) = self.line_end(start + 1) else {
                    return Ok(Token::NeedMoreData);
                };
                self.state.cursor = end;
                self.state.at_line_start = false;
                Ok(Token::Comment {
                    text: Cow::Borrowed(&window[start + 1..end]),
                })
            }
            CLOSE => {
                let Some(range) = self.state.stack.pop() else {
                    return Err(self.fail(ParseErrorKind::UnmatchedSectionClose, start));
                };
                self.state.cursor = start + 1;
                self.state.at_line_start = false;
                Ok(Token::EndSection {
                    key: Cow::Borrowed(self.state.stack.slice(range)),
                })
            }
            _ => self.key(start),
        }
    }

    fn key(&mut self, start: usize) -> Result<Token<'_>, ParseError> {
        let window = self.window;
        let rest = &window[start..];
        let mut terminator = None;
        for (len, c) in rest.char_indices() {
            match c {
                KEY_SEPARATOR | OPEN => {
                    terminator = Some((len, c));
                    break;
                }
                CLOSE | COMMENT | '\n' | '\r' => {
                    return Err(self.fail(ParseErrorKind::InvalidKeyCharacter, start));
                }
                _ => {}
            }
        }
        let Some((len, terminator)) = terminator else {
            if !self.is_final {
                return Ok(Token::NeedMoreData);
            }
            return Err(self.fail(ParseErrorKind::EofInKey, start));
        };

        let key = rest[..len].trim_end();
        if key.is_empty() {
            return Err(self.fail(ParseErrorKind::EmptyKey, start));
        }
        self.state.cursor = start + len + 1;
        self.state.at_line_start = false;

        if terminator == OPEN {
            self.state.stack.push(key);
            return Ok(Token::StartSection {
                key: Cow::Borrowed(key),
            });
        }
        self.state.begin_value(key);
        self.after_key()
    }

    fn after_key(&mut self) -> Result<Token<'_>, ParseError> {
        let window = self.window;
        let c = loop {
            let Some(c) = self.peek() else {
                if !self.is_final {
                    return Ok(Token::NeedMoreData);
                }
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
            self.state.cursor += c.len_utf8();
        };

        let start = self.state.cursor;
        if c == OPEN {
            self.state.enter_value_line(false);
            self.state.cursor = start + 1;
            self.state.stack.push(&self.state.current_key);
            self.state.mode = Mode::List;
            return Ok(Token::StartList {
                key: Cow::Borrowed(&self.state.current_key),
            });
        }

        if let Some(quote) = Quote::from_char(c) {
            let Some(close) = self.closing_quote(start, quote) else {
                if !self.is_final {
                    return Ok(Token::NeedMoreData);
                }
                return Err(self.fail(ParseErrorKind::EofInQuoted, start));
            };
            self.state.cursor = close + 1;
            self.state.enter_value_line(false);
            self.state.mode = Mode::Section;
            return Ok(self.value(Text::quoted(&window[start + 1..close], quote)));
        }

        if self.state.value_line_break {
            if self.state.starts_multiline() {
                self.state.mode = Mode::MultilineStart;
                return Ok(Token::Key {
                    key: Cow::Borrowed(&self.state.current_key),
                });
            }
            // The next line belongs to the enclosing section: the value is
            // empty and `c` is left for the section to read.
            self.state.enter_value_line(true);
            self.state.mode = Mode::Section;
            return Ok(self.value(Text::plain("")));
        }

        let Some(end) = self.line_end(start) else {
            return Ok(Token::NeedMoreData);
        };
        self.state.cursor = end;
        self.state.enter_value_line(false);
        self.state.mode = Mode::Section;
        Ok(self.value(Text::plain(window[start..end].trim_end())))
    }

    fn first_line(&mut self) -> Result<Token<'_>, ParseError> {
        let window = self.window;
        let start = self.state.cursor;
        let Some(end) = self.line_end(start) else {
            return Ok(Token::NeedMoreData);
        };
        self.state.cursor = end;
        self.state.mode = Mode::Multiline { first_line: false };
        Ok(self.value(Text::line("", &window[start..end])))
    }

    fn next_line(&mut self) -> Result<Token<'_>, ParseError> {
        let window = self.window;
        let start = self.state.cursor;
        let rest = &window[start..];
        let mut chars = rest.chars();
        let Some(first) = chars.next() else {
            if !self.is_final {
                return Ok(Token::NeedMoreData);
            }
            self.state.mode = Mode::Section;
            return Ok(Token::EndMultiline);
        };
        debug_assert!(is_line_break(first));
        let newline_len = match (first, chars.next()) {
            ('\r', Some('\n')) => 2,
            ('\r', None) if !self.is_final => return Ok(Token::NeedMoreData),
            _ => 1,
        };
        let newline = &rest[..newline_len];
        let after = &rest[newline_len..];

        let baseline = self.state.multiline_indent.as_str();
        if after.starts_with(baseline) {
            let body = start + newline_len + baseline.len();
            let Some(end) = self.line_end(body) else {
                return Ok(Token::NeedMoreData);
            };
            self.state.cursor = end;
            return Ok(self.value(Text::line(newline, &window[body..end])));
        }
        if !self.is_final && baseline.starts_with(after) {
            return Ok(Token::NeedMoreData);
        }

        // Not indented under the value: the line break ends it and the line
        // is read again as part of the section.
        self.state.cursor = start + newline_len;
        self.state.line_break();
        self.state.mode = Mode::Section;
        Ok(Token::EndMultiline)
    }

    fn list(&mut self) -> Result<Token<'_>, ParseError> {
        let window = self.window;
        let c = loop {
            let Some(c) = self.peek() else {
                if !self.is_final {
                    return Ok(Token::NeedMoreData);
                }
                let cursor = self.state.cursor;
                return Err(self.fail(ParseErrorKind::EofInList, cursor));
            };
            if !c.is_whitespace() {
                break c;
            }
            if is_line_break(c) {
                self.state.line_break();
            } else {
                self.state.blank(c);
            }
            self.state.cursor += c.len_utf8();
        };

        let start = self.state.cursor;
        match c {
            CLOSE => {
                let Some(range) = self.state.stack.pop() else {
                    return Err(self.fail(ParseErrorKind::UnmatchedSectionClose, start));
                };
                self.state.cursor = start + 1;
                self.state.at_line_start = false;
                self.state.mode = Mode::Section;
                Ok(Token::EndList {
                    key: Cow::Borrowed(self.state.stack.slice(range)),
                })
            }
            COMMENT => {
                let Some(len) = find_line_break(&window[start + 1..]) else {
                    if !self.is_final {
                        return Ok(Token::NeedMoreData);
                    }
                    return Err(self.fail(ParseErrorKind::EofInList, start));
                };
                let end = start + 1 + len;
                self.state.cursor = end;
                self.state.at_line_start = false;
                Ok(Token::Comment {
                    text: Cow::Borrowed(&window[start + 1..end]),
                })
            }
            _ => {
                if let Some(quote) = Quote::from_char(c) {
                    let Some(close) = self.closing_quote(start, quote) else {
                        if !self.is_final {
                            return Ok(Token::NeedMoreData);
                        }
                        return Err(self.fail(ParseErrorKind::EofInQuoted, start));
                    };
                    self.state.cursor = close + 1;
                    self.state.at_line_start = false;
                    return Ok(Token::ListValue {
                        text: Text::quoted(&window[start + 1..close], quote),
                    });
                }

                let Some(len) = find_line_break(&window[start..]) else {
                    if !self.is_final {
                        return Ok(Token::NeedMoreData);
                    }
                    return Err(self.fail(ParseErrorKind::EofInList, start));
                };
                let end = start + len;
                self.state.cursor = end;
                self.state.at_line_start = false;
                Ok(Token::ListValue {
                    text: Text::plain(window[start..end].trim_end()),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(source: &str) -> Vec<Token<'static>> {
        let mut tokenizer = BufferTokenizer::complete(source);
        let mut tokens = Vec::new();
        loop {
            let token = tokenizer.next_token().into_owned();
            let done = token.is_terminal();
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    fn value(key: &str, raw: &str) -> Token<'static> {
        Token::Value {
            key: Cow::Owned(key.to_string()),
            text: Text::plain(raw.to_string()),
        }
    }

    fn line(key: &str, newline: &str, raw: &str) -> Token<'static> {
        Token::Value {
            key: Cow::Owned(key.to_string()),
            text: Text::line(newline.to_string(), raw.to_string()),
        }
    }

    fn error(kind: ParseErrorKind, offset: u64) -> Token<'static> {
        Token::Error(ParseError::new(kind, offset))
    }

    #[test]
    fn test_single_value() {
        nestcfg_testhelpers::setup();
        assert_eq!(tokenize("Key:Value"), vec![value("Key", "Value"), Token::End]);
    }

    #[test]
    fn test_single_value_is_trimmed() {
        nestcfg_testhelpers::setup();
        assert_eq!(
            tokenize("  Key :  Value \t\n"),
            vec![value("Key", "Value"), Token::End]
        );
    }

    #[test]
    fn test_unclosed_section() {
        nestcfg_testhelpers::setup();
        assert_eq!(
            tokenize("Key{"),
            vec![
                Token::StartSection {
                    key: Cow::Borrowed("Key")
                },
                error(ParseErrorKind::SectionsToClose(1), 4),
            ]
        );
    }

    #[test]
    fn test_list_with_both_quotes() {
        nestcfg_testhelpers::setup();
        assert_eq!(
            tokenize(r#"List:{"One"'Two'}"#),
            vec![
                Token::StartList {
                    key: Cow::Borrowed("List")
                },
                Token::ListValue {
                    text: Text::quoted("One", Quote::Double)
                },
                Token::ListValue {
                    text: Text::quoted("Two", Quote::Single)
                },
                Token::EndList {
                    key: Cow::Borrowed("List")
                },
                Token::End,
            ]
        );
    }

    #[test]
    fn test_unquoted_list_values() {
        nestcfg_testhelpers::setup();
        let tokens = tokenize("List:{\n\tone \n\t# note\n\ttwo\n}\n");
        assert_eq!(
            tokens,
            vec![
                Token::StartList {
                    key: Cow::Borrowed("List")
                },
                Token::ListValue {
                    text: Text::plain("one")
                },
                Token::Comment {
                    text: Cow::Borrowed(" note")
                },
                Token::ListValue {
                    text: Text::plain("two")
                },
                Token::EndList {
                    key: Cow::Borrowed("List")
                },
                Token::End,
            ]
        );
    }

    #[test]
    fn test_back_to_back_empty_values() {
        nestcfg_testhelpers::setup();
        assert_eq!(
            tokenize("Key1:\nKey2:\n"),
            vec![value("Key1", ""), value("Key2", ""), Token::End]
        );
    }

    #[test]
    fn test_empty_value_at_end_of_input() {
        nestcfg_testhelpers::setup();
        assert_eq!(tokenize("Key:"), vec![value("Key", ""), Token::End]);
    }

    #[test]
    fn test_nested_sections() {
        nestcfg_testhelpers::setup();
        let tokens = tokenize("Outer{\n\tInner{\n\t\tKey:Value\n\t}\n}\n");
        assert_eq!(
            tokens,
            vec![
                Token::StartSection {
                    key: Cow::Borrowed("Outer")
                },
                Token::StartSection {
                    key: Cow::Borrowed("Inner")
                },
                value("Key", "Value"),
                Token::EndSection {
                    key: Cow::Borrowed("Inner")
                },
                Token::EndSection {
                    key: Cow::Borrowed("Outer")
                },
                Token::End,
            ]
        );
    }

    #[test]
    fn test_multiline_value() {
        nestcfg_testhelpers::setup();
        let tokens = tokenize("Key:\n\tA\n\t  B\nNext:x");
        assert_eq!(
            tokens,
            vec![
                Token::Key {
                    key: Cow::Borrowed("Key")
                },
                Token::StartMultiline,
                line("Key", "", "A"),
                line("Key", "\n", "  B"),
                Token::EndMultiline,
                value("Next", "x"),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_multiline_trailing_blank_line() {
        nestcfg_testhelpers::setup();
        let tokens = tokenize("Key:\n\tA\n\t\nNext:x\n");
        assert_eq!(
            tokens,
            vec![
                Token::Key {
                    key: Cow::Borrowed("Key")
                },
                Token::StartMultiline,
                line("Key", "", "A"),
                line("Key", "\n", ""),
                Token::EndMultiline,
                value("Next", "x"),
                Token::End,
            ]
        );
    }

    #[test]
    fn test_multiline_crlf() {
        nestcfg_testhelpers::setup();
        let tokens = tokenize("Key:\r\n\tA\r\n\tB\r\n");
        assert_eq!(
            tokens,
            vec![
                Token::Key {
                    key: Cow::Borrowed("Key")
                },
                Token::StartMultiline,
                line("Key", "", "A"),
                line("Key", "\r\n", "B"),
                Token::EndMultiline,
                Token::End,
            ]
        );
    }

    #[test]
    fn test_multiline_inside_section() {
        nestcfg_testhelpers::setup();
        let tokens = tokenize("S{\n\tKey:\n\t\tA\n\t\tB\n\tOther:y\n}");
        assert_eq!(
            tokens,
            vec![
                Token::StartSection {
                    key: Cow::Borrowed("S")
                },
                Token::Key {
                    key: Cow::Borrowed("Key")
                },
                Token::StartMultiline,
                line("Key", "", "A"),
                line("Key", "\n", "B"),
                Token::EndMultiline,
                value("Other", "y"),
                Token::EndSection {
                    key: Cow::Borrowed("S")
                },
                Token::End,
            ]
        );
    }

    #[test]
    fn test_same_indentation_is_not_multiline() {
        nestcfg_testhelpers::setup();
        let tokens = tokenize("\tKey:\n\tOther:y\n");
        assert_eq!(tokens, vec![value("Key", ""), value("Other", "y"), Token::End]);
    }

    #[test]
    fn test_quoted_values() {
        nestcfg_testhelpers::setup();
        let tokens = tokenize("A:\"say \"\"hi\"\"\"\nB:'it''s'");
        assert_eq!(
            tokens,
            vec![
                Token::Value {
                    key: Cow::Borrowed("A"),
                    text: Text::quoted("say \"\"hi\"\"", Quote::Double),
                },
                Token::Value {
                    key: Cow::Borrowed("B"),
                    text: Text::quoted("it''s", Quote::Single),
                },
                Token::End,
            ]
        );
        let Token::Value { text, .. } = &tokens[0] else {
            panic!("expected a value, got {:?}", tokens[0]);
        };
        assert_eq!(text.unescaped(), "say \"hi\"");
    }

    #[test]
    fn test_comments_at_top_level() {
        nestcfg_testhelpers::setup();
        let tokens = tokenize("# first\nKey:v # not a comment\n#last");
        assert_eq!(
            tokens,
            vec![
                Token::Comment {
                    text: Cow::Borrowed(" first")
                },
                value("Key", "v # not a comment"),
                Token::Comment {
                    text: Cow::Borrowed("last")
                },
                Token::End,
            ]
        );
    }

    #[test]
    fn test_key_errors() {
        nestcfg_testhelpers::setup();
        assert_eq!(
            tokenize("Key"),
            vec![error(ParseErrorKind::EofInKey, 0)]
        );
        assert_eq!(
            tokenize("  Ke#y:v"),
            vec![error(ParseErrorKind::InvalidKeyCharacter, 2)]
        );
        assert_eq!(
            tokenize("Key\nOther:v"),
            vec![error(ParseErrorKind::InvalidKeyCharacter, 0)]
        );
        assert_eq!(tokenize(":v"), vec![error(ParseErrorKind::EmptyKey, 0)]);
    }

    #[test]
    fn test_unmatched_close_is_sticky() {
        nestcfg_testhelpers::setup();
        let mut tokenizer = BufferTokenizer::complete("Key:v\n}\nOther:w");
        assert_eq!(tokenizer.next_token().into_owned(), value("Key", "v"));
        assert_eq!(
            tokenizer.next_token(),
            error(ParseErrorKind::UnmatchedSectionClose, 6)
        );
        for _ in 0..3 {
            assert_eq!(
                tokenizer.next_token(),
                error(ParseErrorKind::AfterError, 6)
            );
        }
    }

    #[test]
    fn test_list_errors() {
        nestcfg_testhelpers::setup();
        assert_eq!(
            tokenize("L:{\n\ta"),
            vec![
                Token::StartList {
                    key: Cow::Borrowed("L")
                },
                error(ParseErrorKind::EofInList, 5),
            ]
        );
        assert_eq!(
            tokenize("L:{\n#c"),
            vec![
                Token::StartList {
                    key: Cow::Borrowed("L")
                },
                error(ParseErrorKind::EofInList, 4),
            ]
        );
        assert_eq!(
            tokenize("L:{'a"),
            vec![
                Token::StartList {
                    key: Cow::Borrowed("L")
                },
                error(ParseErrorKind::EofInQuoted, 3),
            ]
        );
    }

    #[test]
    fn test_need_more_data_resumes() {
        nestcfg_testhelpers::setup();
        let mut tokenizer = BufferTokenizer::new("Key:Val", false, ReaderState::new());
        assert_eq!(tokenizer.next_token(), Token::NeedMoreData);
        assert_eq!(tokenizer.consumed(), 4);
        let state = tokenizer.into_state();
        assert_eq!(state.offset(), 4);

        let mut tokenizer = BufferTokenizer::new("Value\n", true, state);
        assert_eq!(tokenizer.next_token().into_owned(), value("Key", "Value"));
        assert_eq!(tokenizer.next_token(), Token::End);
    }

    #[test]
    fn test_doubled_quote_at_window_edge() {
        nestcfg_testhelpers::setup();
        let mut tokenizer = BufferTokenizer::new("A:'x'", false, ReaderState::new());
        assert_eq!(tokenizer.next_token(), Token::NeedMoreData);
        let state = tokenizer.into_state();

        let mut tokenizer = BufferTokenizer::new("'x''y'", true, state);
        assert_eq!(
            tokenizer.next_token().into_owned(),
            Token::Value {
                key: Cow::Borrowed("A"),
                text: Text::quoted("x''y", Quote::Single),
            }
        );
    }

    #[test]
    fn test_multiline_needs_lookahead_for_baseline() {
        nestcfg_testhelpers::setup();
        let mut tokenizer = BufferTokenizer::new("K:\n\t\tA\n\t", false, ReaderState::new());
        assert!(matches!(tokenizer.next_token(), Token::Key { .. }));
        assert_eq!(tokenizer.next_token(), Token::StartMultiline);
        assert_eq!(tokenizer.next_token().into_owned(), line("K", "", "A"));
        assert_eq!(tokenizer.next_token(), Token::NeedMoreData);
        assert_eq!(tokenizer.consumed(), 6);
    }
}
