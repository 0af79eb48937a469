//! Choosing how a value is written.
//!
//! A value can be written plain (`Key:value`), quoted (`Key:"value"`) or as a
//! multiline block of lines indented under its key. [`encoding`] picks the
//! representation that reads back as the exact same text.

use nestcfg_tokenizer::Quote;
use nestcfg_tokenizer::syntax::{VALUE_START_RESERVED, find_line_break, is_blank, is_line_break};

use crate::options::{MultilineMode, QuoteMode};

/// How a value is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// As is, on the key's line.
    Plain,
    /// Between quotes, with the quote doubled inside.
    Quoted(Quote),
    /// As lines indented one level deeper than the key.
    Multiline,
}

/// Whether a value must be quoted whatever the mode.
///
/// This is the case when the reader would see something other than a value
/// start, or would drop whitespace:
/// 1. the value is empty
/// 2. it starts with `{`, `}`, `#` or a quote
/// 3. it starts or ends with whitespace other than a line break
/// 4. it starts with a line break, which the reader takes for the gap
///    between the key and a multiline block
pub fn needs_quotes(value: &str) -> bool {
    let (Some(first), Some(last)) = (value.chars().next(), value.chars().next_back()) else {
        return true;
    };
    VALUE_START_RESERVED.contains(&first) || is_blank(first) || is_blank(last) || is_line_break(first)
}

/// Decide how to write the value of a key.
pub fn encoding(value: &str, quote: QuoteMode, multiline: MultilineMode) -> Encoding {
    if quote.always() {
        return Encoding::Quoted(quote.quote());
    }
    if value.is_empty() && multiline == MultilineMode::AlwaysIfPossible {
        return Encoding::Multiline;
    }
    if needs_quotes(value) {
        return Encoding::Quoted(quote.quote());
    }
    let has_break = value.contains(is_line_break);
    match multiline {
        MultilineMode::AlwaysIfPossible => Encoding::Multiline,
        _ if !has_break => Encoding::Plain,
        MultilineMode::Auto => Encoding::Multiline,
        MultilineMode::Never => Encoding::Quoted(quote.quote()),
    }
}

/// Decide how to write a list item. Items are never multiline.
pub fn list_item_encoding(value: &str, quote: QuoteMode) -> Encoding {
    if quote.always() || needs_quotes(value) || value.contains(is_line_break) {
        Encoding::Quoted(quote.quote())
    } else {
        Encoding::Plain
    }
}

/// Lines of `s`, each with the line break that ends it.
///
/// `\r\n` counts as one break. The last line comes with an empty break, so
/// text ending in a line break ends with an empty line.
pub fn lines(s: &str) -> Lines<'_> {
    Lines { rest: Some(s) }
}

/// Iterator returned by [`lines`].
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    rest: Option<&'a str>,
}

impl<'a> Iterator for Lines<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.rest?;
        let Some(at) = find_line_break(rest) else {
            self.rest = None;
            return Some((rest, ""));
        };
        let len = if rest[at..].starts_with("\r\n") { 2 } else { 1 };
        self.rest = Some(&rest[at + len..]);
        Some((&rest[..at], &rest[at..at + len]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOUBLE: Encoding = Encoding::Quoted(Quote::Double);

    fn auto(value: &str) -> Encoding {
        encoding(value, QuoteMode::DoubleIfNeeded, MultilineMode::Auto)
    }

    #[test]
    fn test_needs_quotes() {
        nestcfg_testhelpers::setup();
        // These read back as written
        assert!(!needs_quotes("localhost"));
        assert!(!needs_quotes("8080"));
        assert!(!needs_quotes("a b"));
        assert!(!needs_quotes("a#b"));
        assert!(!needs_quotes(":colon"));
        assert!(!needs_quotes("it's"));
        assert!(!needs_quotes("a\nb"));

        // These must be quoted
        assert!(needs_quotes("")); // empty
        assert!(needs_quotes("{braces}")); // section or list
        assert!(needs_quotes("}")); // close
        assert!(needs_quotes("#comment")); // comment
        assert!(needs_quotes("\"quoted\"")); // quote
        assert!(needs_quotes("'quoted'")); // quote
        assert!(needs_quotes(" padded")); // leading space
        assert!(needs_quotes("padded\t")); // trailing tab
        assert!(needs_quotes("\nfirst")); // leading line break
    }

    #[test]
    fn test_auto_mode() {
        nestcfg_testhelpers::setup();
        assert_eq!(auto("Value"), Encoding::Plain);
        assert_eq!(auto("Value\nValue"), Encoding::Multiline);
        assert_eq!(auto("Value\n"), Encoding::Multiline);
        assert_eq!(auto(""), DOUBLE);
        assert_eq!(auto(" x"), DOUBLE);
        assert_eq!(auto("\nx"), DOUBLE);
    }

    #[test]
    fn test_never_mode() {
        nestcfg_testhelpers::setup();
        let never = |v| encoding(v, QuoteMode::SingleIfNeeded, MultilineMode::Never);
        assert_eq!(never("Value"), Encoding::Plain);
        assert_eq!(never("a\nb"), Encoding::Quoted(Quote::Single));
        assert_eq!(never("a\r"), Encoding::Quoted(Quote::Single));
    }

    #[test]
    fn test_always_if_possible_mode() {
        nestcfg_testhelpers::setup();
        let always = |v| encoding(v, QuoteMode::DoubleIfNeeded, MultilineMode::AlwaysIfPossible);
        assert_eq!(always(""), Encoding::Multiline);
        assert_eq!(always("one line"), Encoding::Multiline);
        assert_eq!(always("#hash"), DOUBLE);
        assert_eq!(always("x "), DOUBLE);
    }

    #[test]
    fn test_always_quote_modes_win() {
        nestcfg_testhelpers::setup();
        for multiline in [MultilineMode::Auto, MultilineMode::Never, MultilineMode::AlwaysIfPossible] {
            assert_eq!(encoding("a\nb", QuoteMode::AlwaysDouble, multiline), DOUBLE);
            assert_eq!(
                encoding("", QuoteMode::AlwaysSingle, multiline),
                Encoding::Quoted(Quote::Single)
            );
        }
    }

    #[test]
    fn test_list_items() {
        nestcfg_testhelpers::setup();
        assert_eq!(list_item_encoding("item", QuoteMode::DoubleIfNeeded), Encoding::Plain);
        assert_eq!(list_item_encoding("a\nb", QuoteMode::DoubleIfNeeded), DOUBLE);
        assert_eq!(list_item_encoding("}", QuoteMode::DoubleIfNeeded), DOUBLE);
        assert_eq!(list_item_encoding("", QuoteMode::DoubleIfNeeded), DOUBLE);
        assert_eq!(list_item_encoding("item", QuoteMode::AlwaysDouble), DOUBLE);
    }

    #[test]
    fn test_lines() {
        nestcfg_testhelpers::setup();
        fn collect(s: &str) -> Vec<(&str, &str)> {
            lines(s).collect()
        }

        assert_eq!(collect(""), vec![("", "")]);
        assert_eq!(collect("a"), vec![("a", "")]);
        assert_eq!(collect("a\nb"), vec![("a", "\n"), ("b", "")]);
        assert_eq!(collect("a\r\nb\r"), vec![("a", "\r\n"), ("b", "\r"), ("", "")]);
        assert_eq!(collect("\n\r"), vec![("", "\n"), ("", "\r"), ("", "")]);
    }
}
