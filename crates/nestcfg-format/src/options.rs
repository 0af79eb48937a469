//! Options for writing nestcfg documents.

use nestcfg_tokenizer::Quote;
use nestcfg_tokenizer::syntax::is_line_break;

use crate::WriteError;

/// Line break written after every line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Newline {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
    /// `\r`
    Cr,
    /// `\r\n` on Windows, `\n` elsewhere.
    #[default]
    Platform,
}

impl Newline {
    /// The line break as text.
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
            Newline::Cr => "\r",
            Newline::Platform if cfg!(windows) => "\r\n",
            Newline::Platform => "\n",
        }
    }
}

/// When values are quoted, and with which quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteMode {
    /// Quote with `"` only where the value would not read back otherwise.
    #[default]
    DoubleIfNeeded,
    /// Quote with `'` only where the value would not read back otherwise.
    SingleIfNeeded,
    /// Quote every value with `"`.
    AlwaysDouble,
    /// Quote every value with `'`.
    AlwaysSingle,
}

impl QuoteMode {
    /// The quote character this mode writes.
    pub fn quote(self) -> Quote {
        match self {
            QuoteMode::DoubleIfNeeded | QuoteMode::AlwaysDouble => Quote::Double,
            QuoteMode::SingleIfNeeded | QuoteMode::AlwaysSingle => Quote::Single,
        }
    }

    /// Whether every value is quoted.
    pub fn always(self) -> bool {
        matches!(self, QuoteMode::AlwaysDouble | QuoteMode::AlwaysSingle)
    }
}

/// When values are written as indented blocks of lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultilineMode {
    /// Values containing a line break.
    #[default]
    Auto,
    /// Never; values with line breaks are quoted.
    Never,
    /// Every value that can be, including empty ones.
    AlwaysIfPossible,
}

/// Options for [`Writer`](crate::Writer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    /// One level of indentation (default: a tab).
    pub indent: String,

    /// Line break after each line (default: the platform's).
    pub newline: Newline,

    /// Quoting of values and list items (default: double quotes if needed).
    pub quote: QuoteMode,

    /// Use of multiline blocks (default: for values with line breaks).
    pub multiline: MultilineMode,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            indent: "\t".to_string(),
            newline: Newline::default(),
            quote: QuoteMode::default(),
            multiline: MultilineMode::default(),
        }
    }
}

impl WriterOptions {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the indentation unit.
    pub fn indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    /// Set the line break.
    pub fn newline(mut self, newline: Newline) -> Self {
        self.newline = newline;
        self
    }

    /// Set the quoting mode.
    pub fn quote(mut self, quote: QuoteMode) -> Self {
        self.quote = quote;
        self
    }

    /// Set the multiline mode.
    pub fn multiline(mut self, multiline: MultilineMode) -> Self {
        self.multiline = multiline;
        self
    }

    /// Check that the indentation reads back as indentation.
    pub fn validate(&self) -> Result<(), WriteError> {
        let indent = self.indent.as_str();
        if indent.is_empty()
            || !indent.chars().all(char::is_whitespace)
            || indent.contains(is_line_break)
        {
            return Err(WriteError::InvalidIndent);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        nestcfg_testhelpers::setup();
        let options = WriterOptions::default();
        assert_eq!(options.indent, "\t");
        assert_eq!(options.quote, QuoteMode::DoubleIfNeeded);
        assert_eq!(options.multiline, MultilineMode::Auto);
        assert_eq!(options.newline, Newline::Platform);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_indent_validation() {
        nestcfg_testhelpers::setup();
        for bad in ["", "x", " x", "\n", "\t\r"] {
            assert!(
                matches!(
                    WriterOptions::new().indent(bad).validate(),
                    Err(WriteError::InvalidIndent)
                ),
                "{bad:?} should be rejected"
            );
        }
        for good in [" ", "  ", "\t", " \t"] {
            assert!(WriterOptions::new().indent(good).validate().is_ok());
        }
    }
}
