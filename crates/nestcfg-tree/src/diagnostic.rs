//! Diagnostic rendering for build errors.

use std::ops::Range;

use ariadne::{Color, Config, IndexType, Label, Report, ReportBuilder, ReportKind, Source};
use nestcfg_tokenizer::ParseErrorKind;

use crate::BuildError;

type Span<'a> = (&'a str, Range<usize>);

/// The character at `offset`, or an empty span at the end of `source`.
fn span_at(source: &str, offset: u64) -> Range<usize> {
    let start = usize::try_from(offset)
        .unwrap_or(usize::MAX)
        .min(source.len());
    let len = source
        .get(start..)
        .and_then(|rest| rest.chars().next())
        .map_or(0, char::len_utf8);
    start..start + len
}

impl BuildError {
    /// Render this error with ariadne.
    ///
    /// Returns a string containing the formatted error message with source context.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| self.to_string())
    }

    /// Write the error report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let report = self.build_report(filename, source);
        let _ = report
            .with_config(Config::default().with_index_type(IndexType::Byte))
            .finish()
            .write((filename, Source::from(source)), writer);
    }

    fn build_report<'a>(&self, filename: &'a str, source: &str) -> ReportBuilder<'static, Span<'a>> {
        let BuildError::Parse(err) = self else {
            // No source position for errors found after tokenizing.
            return Report::build(ReportKind::Error, (filename, 0..0))
                .with_message(self.to_string());
        };

        let range = span_at(source, err.offset);
        let labelled = |label: &str| {
            Report::build(ReportKind::Error, (filename, range.clone()))
                .with_message(err.kind.to_string())
                .with_label(
                    Label::new((filename, range.clone()))
                        .with_message(label)
                        .with_color(Color::Red),
                )
        };

        match &err.kind {
            ParseErrorKind::SectionsToClose(n) => labelled("input ends here").with_help(format!(
                "add {n} closing '}}' for the open sections"
            )),
            ParseErrorKind::UnmatchedSectionClose => labelled("no section is open here")
                .with_help("remove the '}' or open a section with 'Key{'"),
            ParseErrorKind::InvalidKeyCharacter => labelled("key starts here")
                .with_help("a key ends at ':' or '{' on the same line"),
            ParseErrorKind::EmptyKey => {
                labelled("key expected here").with_help("put a key before ':' or '{'")
            }
            ParseErrorKind::EofInKey => {
                labelled("key starts here").with_help("end the key with ':' or '{'")
            }
            ParseErrorKind::EofInQuoted => labelled("string starts here")
                .with_help("close the string with the quote it starts with"),
            ParseErrorKind::EofInList => {
                labelled("list item starts here").with_help("close the list with '}'")
            }
            ParseErrorKind::InvalidUtf8 => labelled("invalid UTF-8 here"),
            ParseErrorKind::TokenTooLarge => labelled("token starts here")
                .with_help("raise the maximum buffer capacity"),
            ParseErrorKind::Io(_) => labelled("reading stopped here"),
            ParseErrorKind::AfterError => labelled("a previous error stopped reading"),
        }
    }
}
