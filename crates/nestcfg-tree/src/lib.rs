//! Document trees for nestcfg configuration files.
//!
//! This crate reads a whole document into an owned [`Section`], gives access
//! to values by key or dotted path, and writes trees back out.
//!
//! ```
//! let root = nestcfg_tree::parse("Server{\n\tHost:example.org\n}\n").unwrap();
//! assert_eq!(
//!     root.get_path("Server.Host").and_then(|n| n.as_value()),
//!     Some("example.org")
//! );
//! ```

use std::io;

use nestcfg_format::{WriteError, Writer};
use nestcfg_tokenizer::{BufferedTokenizer, StreamTokenizer, Token};

mod builder;
mod diagnostic;
mod node;

pub use builder::{BuildError, TreeBuilder};
pub use nestcfg_format::WriterOptions;
pub use nestcfg_tokenizer::{Key, ParseError, ParseErrorKind};
pub use node::{Node, NodeKind, Section, TreeError};

fn build(mut next: impl FnMut() -> Token<'static>) -> Result<Section, BuildError> {
    let mut builder = TreeBuilder::new();
    loop {
        let token = next();
        let done = token.is_terminal();
        builder.token(token)?;
        if done {
            return builder.finish();
        }
    }
}

/// Parse a document into a tree.
pub fn parse(source: &str) -> Result<Section, BuildError> {
    let mut tokenizer = StreamTokenizer::from_text(source);
    build(|| tokenizer.next_token())
}

/// Read a document into a tree.
///
/// I/O and UTF-8 errors surface as [`BuildError::Parse`].
pub fn from_reader<R: io::Read>(reader: R) -> Result<Section, BuildError> {
    let mut tokenizer = BufferedTokenizer::new(reader);
    build(|| tokenizer.next_token())
}

/// Write a tree to a string.
pub fn to_string(section: &Section, options: WriterOptions) -> Result<String, WriteError> {
    let mut w = Writer::with_options(Vec::new(), options)?;
    section.write(&mut w)?;
    w.finish()?;
    String::from_utf8(w.into_inner())
        .map_err(|err| WriteError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
}
